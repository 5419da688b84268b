use std::time::Duration;

/// One year, the default lifetime of credential-derived tokens.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Runtime configuration for JWT verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Expected issuer claim (iss).
    pub issuer: String,
    /// Allowable clock skew in seconds when validating exp. Zero is strict.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// Construct config with no leeway.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            leeway_seconds: 0,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}

/// Settings for the Basic-credential path.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Issuer stamped on claims built from verified credentials.
    pub issuer: String,
    /// Validity window of the claims built from verified credentials.
    pub token_ttl: Duration,
    /// Deadline applied to each user-directory lookup.
    pub lookup_timeout: Duration,
}

impl CredentialConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            token_ttl: DEFAULT_TOKEN_TTL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }
}
