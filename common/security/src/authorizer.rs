use std::sync::Arc;

use common_auth::{
    AuthError, Claims, CredentialVerifier, Jwk, TokenCodec, BASIC_SCHEME, BEARER_SCHEME,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::SecurityError;
use crate::policy::{self, PolicyError, Rule};

const UNKNOWN_SCHEME: &str = "unknown";

/// Receives the outcome of every [`Authorizer::authenticate`] call.
///
/// `scheme` is `Bearer`, `Basic` or `unknown` when the credential names neither.
pub trait AuthenticationObserver: Send + Sync {
    fn authenticated(&self, scheme: &str, succeeded: bool);
}

/// Single entry point for request handlers: authentication, authorization and token issuance.
#[derive(Clone)]
pub struct Authorizer {
    codec: TokenCodec,
    credentials: Option<CredentialVerifier>,
    observer: Option<Arc<dyn AuthenticationObserver>>,
}

impl Authorizer {
    /// Bearer-only authorizer; `Basic` credentials are refused.
    pub fn new(codec: TokenCodec) -> Self {
        Self {
            codec,
            credentials: None,
            observer: None,
        }
    }

    pub fn with_credentials(mut self, verifier: CredentialVerifier) -> Self {
        self.credentials = Some(verifier);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AuthenticationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Authenticates an `Authorization` header value, dispatching on its scheme.
    pub async fn authenticate(&self, credential: &str) -> Result<(Uuid, Claims), SecurityError> {
        let scheme = match credential.split_once(' ') {
            Some((BEARER_SCHEME, _)) => BEARER_SCHEME,
            Some((BASIC_SCHEME, _)) => BASIC_SCHEME,
            _ => UNKNOWN_SCHEME,
        };

        let outcome = match scheme {
            BEARER_SCHEME => self.codec.authenticate(credential),
            BASIC_SCHEME => match &self.credentials {
                Some(verifier) => verifier.authenticate(credential).await,
                None => Err(AuthError::AuthenticationFailed),
            },
            _ => Err(AuthError::MalformedHeader),
        };

        if let Some(observer) = &self.observer {
            observer.authenticated(scheme, outcome.is_ok());
        }

        match outcome {
            Ok(claims) => {
                debug!(subject = %claims.subject, scheme, "authenticated");
                Ok((claims.subject, claims))
            }
            Err(err) => {
                if err.is_misconfiguration() {
                    error!(kind = err.kind(), error = %err, "authentication failed on key configuration");
                } else {
                    warn!(kind = err.kind(), error = %err, "authentication failed");
                }
                Err(SecurityError::Unauthenticated(err))
            }
        }
    }

    /// Checks `claims` against `rule`; `owner` is the id owning the target resource, if any.
    pub fn authorize(
        &self,
        claims: &Claims,
        owner: Option<Uuid>,
        rule: Rule,
    ) -> Result<(), SecurityError> {
        let decision = policy::evaluate(claims, owner, rule);
        if !decision.allowed {
            warn!(
                subject = %claims.subject,
                rule = %decision.rule,
                roles = ?decision.roles,
                trace = %decision.trace,
                "authorization denied"
            );
        }

        decision
            .into_result()
            .map_err(|denial| SecurityError::PermissionDenied(PolicyError::from(denial)))
    }

    /// Same as [`Authorizer::authorize`] for a rule given by name.
    pub fn authorize_named(
        &self,
        claims: &Claims,
        owner: Option<Uuid>,
        rule: &str,
    ) -> Result<(), SecurityError> {
        match rule.parse::<Rule>() {
            Ok(rule) => self.authorize(claims, owner, rule),
            Err(err) => {
                error!(rule, "authorization requested for unknown rule");
                Err(SecurityError::PermissionDenied(err))
            }
        }
    }

    /// Signs `claims` with `kid`.
    ///
    /// An unknown kid reads as `Unauthenticated`; only signing failures surface as `TokenIssue`.
    pub fn generate_token(&self, kid: &str, claims: &Claims) -> Result<String, SecurityError> {
        self.codec.generate_token(kid, claims).map_err(|err| {
            error!(kid, kind = err.kind(), error = %err, "token issuance failed");
            if err.is_misconfiguration() {
                SecurityError::Unauthenticated(err)
            } else {
                SecurityError::TokenIssue(err)
            }
        })
    }

    pub fn jwks(&self) -> Vec<Jwk> {
        self.codec.store().jwks()
    }
}
