use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use rand_core::OsRng;
use tracing::debug;
use uuid::Uuid;

use crate::claims::Claims;
use crate::config::CredentialConfig;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

pub const BASIC_SCHEME: &str = "Basic";

/// Record returned by a user directory for credential checks.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub enabled: bool,
}

/// Source of identities for the Basic-credential path.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns `None` when no identity is registered under `email`.
    async fn lookup_by_email(&self, email: &str) -> AuthResult<Option<DirectoryUser>>;
}

/// Process-local directory, used for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, DirectoryUser>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: DirectoryUser) {
        let mut guard = self.users.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(user.email.to_ascii_lowercase(), user);
    }

    /// Hashes `password` and registers an enabled user, returning its id.
    pub fn add_user(&self, email: &str, password: &str, roles: &[Role]) -> AuthResult<Uuid> {
        let id = Uuid::new_v4();
        self.insert(DirectoryUser {
            id,
            email: email.to_string(),
            password_hash: hash_password(password)?,
            roles: roles.to_vec(),
            enabled: true,
        });
        Ok(id)
    }

    pub fn set_enabled(&self, email: &str, enabled: bool) -> bool {
        let mut guard = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match guard.get_mut(&email.to_ascii_lowercase()) {
            Some(user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup_by_email(&self, email: &str) -> AuthResult<Option<DirectoryUser>> {
        let guard = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(&email.to_ascii_lowercase()).cloned())
    }
}

/// Produces an argon2 PHC string with a random salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    if password.is_empty() {
        return Err(AuthError::PasswordHash("password must not be empty".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::PasswordHash(err.to_string()))
}

/// Constant-time check of `password` against a stored PHC hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// Checked when the account is missing or disabled so every failure path pays for one hash.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("unused-placeholder-credential").ok());

fn burn_password_check(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Authenticates `Basic` credentials against a [`UserDirectory`].
#[derive(Clone)]
pub struct CredentialVerifier {
    config: CredentialConfig,
    directory: Arc<dyn UserDirectory>,
}

impl CredentialVerifier {
    pub fn new(config: CredentialConfig, directory: Arc<dyn UserDirectory>) -> Self {
        Self { config, directory }
    }

    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    /// Validates an `Authorization` header value of the form `Basic <base64(email:password)>`.
    ///
    /// Unknown, disabled and wrong-password accounts all fail with
    /// [`AuthError::AuthenticationFailed`].
    pub async fn authenticate(&self, header_value: &str) -> AuthResult<Claims> {
        let (email, password) = parse_basic(header_value)?;
        let email = parse_email(&email)?;

        let lookup = tokio::time::timeout(
            self.config.lookup_timeout,
            self.directory.lookup_by_email(email),
        )
        .await
        .map_err(|_| AuthError::DirectoryTimeout)??;

        let user = match lookup {
            Some(user) if user.enabled => user,
            Some(user) => {
                burn_password_check(&password);
                debug!(user_id = %user.id, "credential check against disabled account");
                return Err(AuthError::AuthenticationFailed);
            }
            None => {
                burn_password_check(&password);
                return Err(AuthError::AuthenticationFailed);
            }
        };

        if !verify_password(&password, &user.password_hash) {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::AuthenticationFailed);
        }

        let ttl = chrono::Duration::from_std(self.config.token_ttl)
            .map_err(|err| AuthError::TokenLifetime(err.to_string()))?;
        Claims::issue(user.id, user.roles, self.config.issuer.clone(), ttl)
    }
}

fn parse_basic(value: &str) -> AuthResult<(String, String)> {
    let parts = value.split(' ').collect::<Vec<_>>();
    let encoded = match parts.as_slice() {
        [scheme, encoded] if *scheme == BASIC_SCHEME && !encoded.is_empty() => *encoded,
        _ => return Err(AuthError::MalformedHeader),
    };

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;
    let (email, password) = decoded.split_once(':').ok_or(AuthError::MalformedHeader)?;

    Ok((email.to_string(), password.to_string()))
}

/// Accepts `user@example.com` or `Name <user@example.com>` and returns the bare address.
fn parse_email(value: &str) -> AuthResult<&str> {
    let trimmed = value.trim();
    let address = match (trimmed.find('<'), trimmed.strip_suffix('>')) {
        (Some(open), Some(inner)) => &inner[open + 1..],
        (None, None) => trimmed,
        _ => return Err(AuthError::InvalidEmailFormat),
    };

    let (local, domain) = address
        .rsplit_once('@')
        .ok_or(AuthError::InvalidEmailFormat)?;

    let valid_local = !local.is_empty() && !local.contains('@');
    let valid_domain = !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    let clean = !address
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | ',' | ';'));

    if valid_local && valid_domain && clean {
        Ok(address)
    } else {
        Err(AuthError::InvalidEmailFormat)
    }
}
