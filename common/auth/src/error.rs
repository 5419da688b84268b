use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header malformed")]
    MalformedHeader,
    #[error("invalid key format for kid '{0}': {1}")]
    InvalidKeyFormat(String, String),
    #[error("kid '{0}' is already loaded")]
    DuplicateKeyId(String),
    #[error("no key material registered for kid '{0}'")]
    KeyNotFound(String),
    #[error("signing key unavailable for kid '{0}'")]
    SigningKeyUnavailable(String),
    #[error("token missing kid header")]
    MissingKeyId,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is expired")]
    TokenExpired,
    #[error("token issuer is not accepted")]
    InvalidIssuer,
    #[error("invalid subject '{0}'")]
    InvalidSubject(String),
    #[error("unrecognized role '{0}'")]
    InvalidRole(String),
    #[error("malformed claim payload: {0}")]
    InvalidClaims(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("token lifetime out of range: {0}")]
    TokenLifetime(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("invalid email format")]
    InvalidEmailFormat,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("user directory unavailable: {0}")]
    DirectoryUnavailable(String),
    #[error("user directory lookup exceeded its deadline")]
    DirectoryTimeout,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AuthError {
    /// Failures caused by server-side key configuration rather than the presented credential.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            AuthError::KeyNotFound(_)
                | AuthError::SigningKeyUnavailable(_)
                | AuthError::InvalidKeyFormat(_, _)
                | AuthError::DuplicateKeyId(_)
                | AuthError::TokenLifetime(_)
        )
    }

    /// Stable, low-cardinality label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedHeader => "malformed_header",
            AuthError::InvalidKeyFormat(_, _) => "invalid_key_format",
            AuthError::DuplicateKeyId(_) => "duplicate_kid",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::SigningKeyUnavailable(_) => "signing_key_unavailable",
            AuthError::MissingKeyId => "missing_kid",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidSubject(_) => "invalid_subject",
            AuthError::InvalidRole(_) => "invalid_role",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::Verification(_) => "verification",
            AuthError::TokenLifetime(_) => "token_lifetime",
            AuthError::Signing(_) => "signing",
            AuthError::InvalidEmailFormat => "invalid_email",
            AuthError::AuthenticationFailed => "authentication_failed",
            AuthError::DirectoryUnavailable(_) => "directory_unavailable",
            AuthError::DirectoryTimeout => "directory_timeout",
            AuthError::PasswordHash(_) => "password_hash",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match value.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            // The header is decoded separately, so a base64 failure here sits in the signature segment.
            ErrorKind::InvalidSignature | ErrorKind::Base64(_) | ErrorKind::Crypto(_) => {
                Self::InvalidSignature
            }
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::Json(err) => Self::InvalidClaims(err.to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::InvalidClaims(format!("missing required claim '{claim}'"))
            }
            _ => Self::Verification(value.to_string()),
        }
    }
}
