//! Token verification against the auth provider.
//!
//! The platform never issues tokens; callers present a provider token and
//! the service checks it with the provider's verification endpoint. Write
//! paths then compare the verified subject with the claimed user.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token rejected: {0}")]
    InvalidToken(String),
    #[error("auth provider unreachable: {0}")]
    Provider(String),
}

/// Claims extracted from a verified token.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    /// The provider-issued subject id, stored as `social_id` on users.
    pub subject_id: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    user_id: String,
}

/// Verifies tokens by posting them to the provider's verification endpoint.
pub struct HttpTokenVerifier {
    client: Client,
    verify_url: Url,
}

impl HttpTokenVerifier {
    pub fn new(verify_url: Url) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|err| AuthError::Provider(err.to_string()))?;
        Ok(Self { client, verify_url })
    }
}

fn user_agent() -> &'static str {
    concat!("pixie/", env!("CARGO_PKG_VERSION"))
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let response = self
            .client
            .post(self.verify_url.clone())
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|err| AuthError::Provider(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: VerifyResponse = response
                    .json()
                    .await
                    .map_err(|err| AuthError::Provider(err.to_string()))?;
                Ok(TokenClaims {
                    subject_id: body.user_id,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                Err(AuthError::InvalidToken(format!(
                    "provider returned {}",
                    response.status()
                )))
            }
            other => Err(AuthError::Provider(format!("provider returned {other}"))),
        }
    }
}

/// Accepts any token and returns a fixed subject. Test wiring only.
pub struct StaticVerifier {
    subject_id: String,
}

impl StaticVerifier {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
        }
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, _token: &str) -> Result<TokenClaims, AuthError> {
        Ok(TokenClaims {
            subject_id: self.subject_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_verifier_returns_its_subject() {
        let verifier = StaticVerifier::new("sub-1");
        let claims = verifier.verify("anything").await.expect("claims");
        assert_eq!(claims.subject_id, "sub-1");
    }
}
