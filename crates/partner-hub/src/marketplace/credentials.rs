//! Password hashing and partner session tokens.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{PartnerId, WorkEmail};
use super::repository::{PartnerStore, RepositoryError};
use crate::config::AuthConfig;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Failures raised while hashing, verifying, or issuing credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid email")]
    UnknownEmail,
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error("session token rejected: {0}")]
    TokenRejected(String),
    #[error("credential backend failure: {0}")]
    Crypto(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Hash a plaintext password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Crypto(format!("hash error: {err}")))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, CredentialError> {
    let parsed = argon2::PasswordHash::new(hash)
        .map_err(|err| CredentialError::Crypto(format!("invalid hash format: {err}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(CredentialError::Crypto(format!("verify error: {err}"))),
    }
}

/// Claims carried by a partner session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issues HS256 session tokens for validated partners.
pub struct CredentialService<P> {
    partners: Arc<P>,
    config: AuthConfig,
}

impl<P> CredentialService<P>
where
    P: PartnerStore + 'static,
{
    pub fn new(partners: Arc<P>, config: AuthConfig) -> Self {
        Self { partners, config }
    }

    pub fn login(&self, request: &LoginRequest) -> Result<SessionToken, CredentialError> {
        let email = WorkEmail::parse(&request.email).ok_or(CredentialError::UnknownEmail)?;
        let partner = self
            .partners
            .find_partner_by_email(&email)?
            .ok_or(CredentialError::UnknownEmail)?;

        if !verify_password(&request.password, &partner.details.credential_hash)? {
            return Err(CredentialError::InvalidCredentials);
        }

        let token = self.issue(&partner.id, &email, Utc::now())?;
        info!(partner_id = %partner.id, "partner session issued");
        Ok(token)
    }

    pub fn issue(
        &self,
        partner_id: &PartnerId,
        email: &WorkEmail,
        issued_at: DateTime<Utc>,
    ) -> Result<SessionToken, CredentialError> {
        let ttl = self.config.token_ttl_secs.min(i32::MAX as u64) as i64;
        let expires_at = issued_at + Duration::seconds(ttl);
        let claims = SessionClaims {
            sub: partner_id.to_string(),
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let key = EncodingKey::from_secret(self.config.token_secret.as_bytes());
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|err| CredentialError::Crypto(format!("JWT encode: {err}")))?;

        Ok(SessionToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, CredentialError> {
        let key = DecodingKey::from_secret(self.config.token_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        jsonwebtoken::decode::<SessionClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|err| CredentialError::TokenRejected(err.to_string()))
    }
}
