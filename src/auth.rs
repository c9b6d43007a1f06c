use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::RepoError;

/// Lifetime of an issued token, in seconds.
pub const TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// Claims
///
/// Payload of every token this service issues. Signed with the configured
/// symmetric secret and checked on every guarded request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric id of the user the token was issued to.
    pub user_id: i32,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp): `iat + TOKEN_TTL_SECS`.
    pub exp: usize,
}

/// AuthError
///
/// Every way a request can fail to establish an identity. All of them surface
/// as 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("empty header")]
    MissingHeader,

    #[error("invalid auth header")]
    InvalidHeader,

    #[error("token is empty")]
    EmptyToken,

    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),

    /// No user matches the supplied login and password.
    #[error("invalid login or password: {0}")]
    Credentials(RepoError),

    #[error("user id not found")]
    MissingIdentity,
}

/// generate_token
///
/// Mints an HS256 token for `user_id`, valid for `TOKEN_TTL_SECS`.
pub fn generate_token(user_id: i32, secret: &str) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id,
        iat: now as usize,
        exp: (now + TOKEN_TTL_SECS) as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// parse_token
///
/// Verifies signature and expiry and returns the user id. Only the HMAC family
/// is accepted; a token announcing any other algorithm is rejected.
pub fn parse_token(token: &str, secret: &str) -> Result<i32, AuthError> {
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.validate_exp = true;
    validation.required_spec_claims = ["exp".to_string()].into_iter().collect();

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims.user_id)
}

/// hash_password
///
/// Hex SHA-256 digest of the password followed by the configured salt. Stored
/// credentials are compared hash to hash.
///
/// The salt is mixed into the digest input rather than appended to a SHA-1
/// output, so hashes written by other deployments of this API do not verify
/// here; existing users must re-register.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
