use anyhow::{anyhow, Context, Result};
use common_auth::{CredentialConfig, JwtConfig};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_KEYS_FOLDER: &str = "keys";
const DEFAULT_ISSUER: &str = "service project";
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;
// Ten years.
const MAX_TOKEN_TTL_SECONDS: u64 = 10 * DEFAULT_TOKEN_TTL_SECONDS;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub keys_folder: PathBuf,
    /// Kid used when a token request does not name one.
    pub active_kid: String,
    pub issuer: String,
    pub token_ttl: Duration,
    pub leeway_seconds: u32,
    pub lookup_timeout: Duration,
    pub host: IpAddr,
    pub port: u16,
}

impl ServiceConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.issuer.clone()).with_leeway(self.leeway_seconds)
    }

    pub fn credential_config(&self) -> CredentialConfig {
        CredentialConfig::new(self.issuer.clone())
            .with_token_ttl(self.token_ttl)
            .with_lookup_timeout(self.lookup_timeout)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_service_config() -> Result<ServiceConfig> {
    load_from(|key| env::var(key).ok())
}

/// Builds the config from an arbitrary variable source.
pub fn load_from<F>(lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

    let database_url = var("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;
    let active_kid = var("AUTH_ACTIVE_KID").ok_or_else(|| anyhow!("AUTH_ACTIVE_KID must be set"))?;

    let keys_folder = var("AUTH_KEYS_FOLDER")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYS_FOLDER));
    let issuer = var("AUTH_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string());

    let token_ttl_seconds = parse_var(&var, "AUTH_TOKEN_TTL_SECONDS")?.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
    if token_ttl_seconds == 0 || token_ttl_seconds > MAX_TOKEN_TTL_SECONDS {
        return Err(anyhow!(
            "AUTH_TOKEN_TTL_SECONDS must be between 1 and {MAX_TOKEN_TTL_SECONDS}"
        ));
    }
    let leeway_seconds = parse_var(&var, "AUTH_LEEWAY_SECONDS")?.unwrap_or(0);
    let lookup_timeout_ms =
        parse_var(&var, "AUTH_LOOKUP_TIMEOUT_MS")?.unwrap_or(DEFAULT_LOOKUP_TIMEOUT_MS);

    let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
    let host = host
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid HOST '{host}'"))?;
    let port = parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT);

    Ok(ServiceConfig {
        database_url,
        keys_folder,
        active_kid,
        issuer,
        token_ttl: Duration::from_secs(token_ttl_seconds),
        leeway_seconds,
        lookup_timeout: Duration::from_millis(lookup_timeout_ms),
        host,
        port,
    })
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|err| anyhow!("Failed to parse {key} '{value}': {err}"))
        })
        .transpose()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
