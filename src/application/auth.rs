//! Admin authentication: Argon2id credentials and server-side sessions.
//!
//! Session tokens are opaque `ad_<prefix>_<secret>` strings. The database
//! stores the prefix and the SHA-256 of the secret half; resolution looks
//! the row up by prefix and compares hashes in constant time, so neither a
//! leaked database nor a timing side channel yields a usable token.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::SessionRecord;

const TOKEN_PREFIX: &str = "ad";
const MIN_SECRET_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username and wrong password collapse into one variant so the
    /// login form cannot be used to enumerate accounts.
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("current password is incorrect")]
    CurrentPasswordMismatch,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("user not found")]
    UserNotFound,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum SessionAuthError {
    #[error("missing session")]
    Missing,
    #[error("invalid session")]
    Invalid,
    #[error("expired session")]
    Expired,
}

/// Freshly-issued session; the token exists only in this value and in the
/// client cookie.
#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// The authenticated admin attached to gated requests.
#[derive(Debug, Clone)]
pub struct AdminPrincipal {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    /// Seed the configured default credential when no admin exists yet.
    pub async fn ensure_seed_admin(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if self.users.count_users().await? > 0 {
            return Ok(());
        }

        let hash = hash_password(password)?;
        match self.users.create_user(username, &hash).await {
            Ok(_) => {
                warn!(
                    target = "foglio::auth",
                    username, "seeded default admin credential; change the password"
                );
                Ok(())
            }
            // Another instance seeded concurrently.
            Err(RepoError::Duplicate { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionIssued, AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");

        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.session_ttl;
        self.sessions
            .insert_session(SessionRecord {
                prefix,
                hashed_secret: hash_secret(&secret),
                user_id: user.id,
                created_at: now,
                expires_at,
            })
            .await?;

        Ok(SessionIssued { token, expires_at })
    }

    /// Resolve a session token into its principal.
    pub async fn resolve(&self, token: &str) -> Result<AdminPrincipal, SessionAuthError> {
        let parsed = parse_token(token).ok_or(SessionAuthError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| SessionAuthError::Invalid)?
            .ok_or(SessionAuthError::Invalid)?;

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionAuthError::Invalid);
        }

        let now = OffsetDateTime::now_utc();
        if session.expires_at <= now {
            // Reap the row; the cookie is already useless.
            let sessions = self.sessions.clone();
            let prefix = session.prefix.clone();
            tokio::spawn(async move {
                let _ = sessions.delete_by_prefix(&prefix).await;
            });
            return Err(SessionAuthError::Expired);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await
            .map_err(|_| SessionAuthError::Invalid)?
            .ok_or(SessionAuthError::Invalid)?;

        Ok(AdminPrincipal {
            user_id: user.id,
            username: user.username,
        })
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_by_prefix(&parsed.prefix).await?;
        }
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        if new.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(current, &user.password_hash)? {
            return Err(AuthError::CurrentPasswordMismatch);
        }

        let hash = hash_password(new)?;
        self.users.update_password_hash(user.id, &hash).await?;
        Ok(())
    }

    /// Remove expired session rows; returns how many were reaped.
    pub async fn reap_expired_sessions(&self) -> Result<u64, AuthError> {
        self.sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await
            .map_err(AuthError::from)
    }
}

/// Hash a password into a PHC-formatted Argon2id string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|err| AuthError::Hashing(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::Hashing(err.to_string())),
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}
