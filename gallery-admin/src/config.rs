//! Command-line and environment configuration, and backend construction.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gallery_admin_core::{
    admin::CompensationPolicy,
    backend::{
        hosted::{HostedBackend, HostedConfig},
        memory::MemoryBackend,
        s3::S3ObjectStorage,
        Backend,
    },
    gallery::IMAGE_BUCKET,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Everything in process; state is lost on exit.
    Memory,
    /// Hosted REST gateway plus its S3-compatible object storage.
    Hosted,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "gallery-admin")]
#[command(about = "Role-gated administration API for the image gallery")]
pub struct Cli {
    /// Listen address
    #[arg(long, env = "GALLERY_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,

    #[arg(long, env = "GALLERY_BACKEND", value_enum, default_value_t = BackendKind::Memory)]
    pub backend: BackendKind,

    /// Base URL of the hosted backend
    #[arg(long, env = "GALLERY_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Service-role key for the hosted backend
    #[arg(long, env = "GALLERY_SERVICE_KEY", hide_env_values = true)]
    pub service_key: Option<String>,

    /// Verify session tokens locally with this HS256 secret
    #[arg(long, env = "GALLERY_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// S3-compatible endpoint; defaults to `{backend_url}/storage/v1/s3`
    #[arg(long, env = "GALLERY_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "GALLERY_S3_BUCKET", default_value = IMAGE_BUCKET)]
    pub s3_bucket: String,

    /// Base of public object URLs; defaults to `{backend_url}/storage/v1/object/public`
    #[arg(long, env = "GALLERY_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Timeout applied to every outbound request
    #[arg(long, env = "GALLERY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Superadmin created at startup (memory backend only)
    #[arg(long, env = "GALLERY_SEED_EMAIL", requires = "seed_password")]
    pub seed_email: Option<String>,

    #[arg(long, env = "GALLERY_SEED_PASSWORD", hide_env_values = true)]
    pub seed_password: Option<String>,

    #[arg(long, env = "GALLERY_SEED_NAME", default_value = "Admin")]
    pub seed_name: String,

    /// Delete the new identity again when its role record cannot be stored
    #[arg(long, env = "GALLERY_COMPENSATE")]
    pub compensate: bool,
}

impl Cli {
    pub fn compensation(&self) -> CompensationPolicy {
        if self.compensate {
            CompensationPolicy::DeleteIdentity
        } else {
            CompensationPolicy::None
        }
    }

    fn hosted_url(&self) -> Result<String> {
        self.backend_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .context("--backend-url is required for the hosted backend")
    }
}

pub async fn build_backend(cli: &Cli) -> Result<Backend> {
    match cli.backend {
        BackendKind::Memory => {
            let memory = Arc::new(MemoryBackend::new());
            if let (Some(email), Some(password)) = (&cli.seed_email, &cli.seed_password) {
                memory
                    .seed_superadmin(email, password, &cli.seed_name)
                    .await
                    .context("seeding superadmin")?;
                info!(%email, "seeded superadmin");
            }
            Ok(Backend::uniform(memory))
        }
        BackendKind::Hosted => {
            let url = cli.hosted_url()?;
            let rest = HostedBackend::new(HostedConfig {
                url: url.clone(),
                service_key: cli
                    .service_key
                    .clone()
                    .context("--service-key is required for the hosted backend")?,
                jwt_secret: cli.jwt_secret.clone(),
                request_timeout: Duration::from_secs(cli.request_timeout_secs),
            })?;

            let endpoint = cli
                .s3_endpoint
                .clone()
                .unwrap_or_else(|| format!("{url}/storage/v1/s3"));
            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .load()
                .await;
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            let objects = S3ObjectStorage {
                client: aws_sdk_s3::Client::from_conf(s3_config),
                bucket: cli.s3_bucket.clone(),
                public_base: cli
                    .public_url
                    .clone()
                    .unwrap_or_else(|| format!("{url}/storage/v1/object/public")),
            };
            info!(%url, bucket = %cli.s3_bucket, "using hosted backend");
            Ok(Backend::hosted(Arc::new(rest), Arc::new(objects)))
        }
    }
}
