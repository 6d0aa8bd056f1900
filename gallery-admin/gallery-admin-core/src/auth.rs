use crate::identity::IdentityUser;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
}

/// Claims carried by a backend-issued session token.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    pub exp: u64,
}

impl Claims {
    pub fn into_user(self) -> IdentityUser {
        IdentityUser {
            id: self.sub,
            email: self.email.unwrap_or_default(),
            name: self.user_metadata.name.unwrap_or_default(),
        }
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;
}

/// Verifies session tokens signed with the backend's shared JWT secret.
pub struct Hs256Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Verifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // session tokens carry aud=authenticated; nothing else issues HS256 here
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.key, &self.validation)
            .ok()
            .map(|d| d.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: u64) -> String {
        let claims = Claims {
            sub: "u-1".into(),
            email: Some("ann@example.com".into()),
            user_metadata: UserMetadata {
                name: Some("Ann".into()),
            },
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let verifier = Hs256Verifier::new("secret");
        let claims = verifier.verify(&token("secret", far_future())).await.unwrap();
        let user = claims.into_user();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.email, "ann@example.com");
        assert_eq!(user.name, "Ann");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let verifier = Hs256Verifier::new("secret");
        assert!(verifier.verify(&token("other", far_future())).await.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let verifier = Hs256Verifier::new("secret");
        assert!(verifier.verify(&token("secret", 1_000)).await.is_none());
    }
}
