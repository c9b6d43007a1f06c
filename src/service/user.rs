use tracing::debug;

use super::finish;
use crate::auth::{self, AuthError};
use crate::config::AppConfig;
use crate::error::RepoError;
use crate::models::{Credentials, NewUser, Role, RoleUpdate};
use crate::repository::RepositoryState;

/// UserService
///
/// Registration, login and role management. Holds the token secret and the
/// password salt so nothing above it ever handles a raw credential.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    jwt_secret: String,
    password_salt: String,
}

impl UserService {
    pub fn new(repo: RepositoryState, config: &AppConfig) -> Self {
        Self {
            repo,
            jwt_secret: config.jwt_secret.clone(),
            password_salt: config.password_salt.clone(),
        }
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<i32, RepoError> {
        let hash = auth::hash_password(&user.password, &self.password_salt);

        let mut tx = self.repo.begin().await?;
        let result = tx.create_user(&user.login, &hash, user.user_role).await;
        let id = finish(tx, result).await?;

        debug!(user_id = id, login = %user.login, "user created");
        Ok(id)
    }

    /// Looks the user up by login and salted hash and mints a token for it.
    pub async fn generate_token(&self, credentials: &Credentials) -> Result<String, AuthError> {
        let hash = auth::hash_password(&credentials.password, &self.password_salt);
        let user = self
            .repo
            .find_user(&credentials.login, &hash)
            .await
            .map_err(AuthError::Credentials)?;
        auth::generate_token(user.id, &self.jwt_secret)
    }

    pub fn parse_token(&self, token: &str) -> Result<i32, AuthError> {
        auth::parse_token(token, &self.jwt_secret)
    }

    /// `Ok(true)` when the user holds the admin role.
    pub async fn validate_user(&self, id: i32) -> Result<bool, RepoError> {
        let role = self.repo.user_role(id).await?;
        Ok(role == Role::Admin)
    }

    pub async fn update_user(&self, update: &RoleUpdate) -> Result<(), RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = tx.update_user_role(&update.login, update.user_role).await;
        finish(tx, result).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<(), RepoError> {
        let mut tx = self.repo.begin().await?;
        let result = tx.delete_user(id).await;
        finish(tx, result).await
    }
}
