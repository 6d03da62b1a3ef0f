//! Login and profile reads.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{UpsertUserParams, UsersRepo};
use crate::domain::entities::{ProfileRecord, UserRecord};
use crate::infra::auth::TokenVerifier;

/// Identity fields asserted by the auth provider alongside the token.
#[derive(Debug, Clone)]
pub struct LoginProfile {
    pub social_id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    verifier: Arc<dyn TokenVerifier>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { users, verifier }
    }

    /// Verifies the provider token, then finds or creates the user row.
    /// The token subject must match the asserted social id.
    #[instrument(skip(self, token, profile))]
    pub async fn login(&self, token: &str, profile: LoginProfile) -> Result<UserRecord, AppError> {
        let claims = self.verifier.verify(token).await?;
        if claims.subject_id != profile.social_id {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .users
            .upsert_on_login(UpsertUserParams {
                social_id: profile.social_id,
                name: profile.name,
                email: profile.email,
                avatar: profile.avatar,
            })
            .await?;

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    /// Public profile: user, follow counts, five most recent blogs.
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> Result<ProfileRecord, AppError> {
        self.users
            .profile(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
