//! Credential verification and HS256 session tokens.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use thiserror::Error;
use tracing::instrument;

use crate::claims::{Claims, TokenValidationError, validate_claims};
use crate::password::{
    HASH_COST, PasswordError, hash_password_with_cost, verify_password, verify_password_blocking,
};
use crate::user::{CredentialStore, CredentialStoreError, User};

/// Session lifetime in hours.
pub const TOKEN_TTL_HOURS: i64 = 12;

/// Plaintext behind the placeholder hash checked for unknown usernames.
const UNKNOWN_USER_PASSWORD: &str = "stockledger-unknown-user";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature does not match")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("invalid token claims: {0}")]
    InvalidClaims(TokenValidationError),

    #[error("failed to sign token: {0}")]
    Encoding(String),
}

impl From<TokenValidationError> for TokenError {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => TokenError::Expired,
            other => TokenError::InvalidClaims(other),
        }
    }
}

/// Login failures.
///
/// `UserNotFound` and `InvalidCredentials` are distinct here for logging;
/// the HTTP boundary reports both identically.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user '{username}' not found")]
    UserNotFound { username: String },

    #[error("invalid credentials for user '{username}'")]
    InvalidCredentials { username: String },

    #[error(transparent)]
    Store(#[from] CredentialStoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Issues and verifies signed claim bundles.
///
/// The secret is fixed for the lifetime of the service; share it behind an
/// `Arc`.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    hash_cost: u32,
    // Built on first use at `hash_cost`; shared between clones.
    unknown_user_hash: Arc<OnceLock<String>>,
    credentials: Arc<dyn CredentialStore>,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("hash_cost", &self.hash_cost)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(TOKEN_TTL_HOURS),
            hash_cost: HASH_COST,
            unknown_user_hash: Arc::new(OnceLock::new()),
            credentials,
        }
    }

    /// bcrypt cost of the stored hashes; unknown-username checks run at the same cost.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self.unknown_user_hash = Arc::new(OnceLock::new());
        self
    }

    /// Build the claims a login at `now` would carry for `user`.
    pub fn claims_for(&self, user: &User, now: DateTime<Utc>) -> Claims {
        Claims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        }
    }

    /// Check a username/password pair and return fresh claims.
    #[instrument(skip(self, password), fields(username = %username), err)]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Claims, AuthError> {
        let Some(user) = self.credentials.find_by_username(username).await? else {
            // Same bcrypt work as a wrong password, so timing does not reveal the username.
            self.check_unknown_user(password).await?;
            return Err(AuthError::UserNotFound {
                username: username.to_string(),
            });
        };

        if !verify_password_blocking(password.to_owned(), user.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials {
                username: username.to_string(),
            });
        }

        Ok(self.claims_for(&user, Utc::now()))
    }

    async fn check_unknown_user(&self, password: &str) -> Result<(), PasswordError> {
        let slot = self.unknown_user_hash.clone();
        let cost = self.hash_cost;
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let hash = match slot.get() {
                Some(hash) => hash,
                None => {
                    let hash = hash_password_with_cost(UNKNOWN_USER_PASSWORD, cost)?;
                    slot.get_or_init(|| hash)
                }
            };
            verify_password(&password, hash).map(|_| ())
        })
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// `authenticate` followed by `issue`.
    pub async fn login(&self, username: &str, password: &str) -> Result<(Claims, String), AuthError> {
        let claims = self.authenticate(username, password).await?;
        let token = self.issue(&claims)?;
        Ok((claims, token))
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature and structure, then the time window against `now`.
    ///
    /// Claims are returned exactly as issued; nothing is refreshed.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
