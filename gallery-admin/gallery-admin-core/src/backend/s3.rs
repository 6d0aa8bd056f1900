use crate::error::StoreError;
use crate::gallery::{ObjectStorage, StoredObject};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;

/// Image bucket reached through the backend's S3-compatible endpoint.
pub struct S3ObjectStorage {
    pub client: aws_sdk_s3::Client,
    pub bucket: String,
    /// Base that public object URLs are formed from, without the bucket.
    pub public_base: String,
}

fn store_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::new(err.to_string())
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(&self, path: &str, data: Bytes) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(store_err)?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base.trim_end_matches('/'),
            self.bucket,
            path
        )
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&dir)
            .delimiter("/")
            .send()
            .await
            .map_err(store_err)?;
        Ok(resp
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .filter_map(|key| key.strip_prefix(&dir))
            .map(|name| StoredObject {
                name: name.to_string(),
            })
            .collect())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let objects = paths
            .iter()
            .map(|path| ObjectIdentifier::builder().key(path).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(store_err)?;
        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
