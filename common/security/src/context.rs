use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use common_auth::Claims;
use uuid::Uuid;

use crate::authorizer::Authorizer;
use crate::error::SecurityError;
use crate::policy::Rule;

/// Authenticated caller, resolved from the `Authorization` header.
///
/// Handlers receive this explicitly and pass `claims` on to whatever needs them.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: Uuid,
    pub claims: Claims,
}

impl AuthContext {
    /// Applies `rule` to this caller through `authorizer`.
    pub fn require(
        &self,
        authorizer: &Authorizer,
        owner: Option<Uuid>,
        rule: Rule,
    ) -> Result<(), SecurityError> {
        authorizer.authorize(&self.claims, owner, rule)
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<Authorizer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SecurityError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authorizer = Arc::<Authorizer>::from_ref(state);

        // A missing or non-ASCII header still goes through `authenticate` so it is observed.
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        let (subject, claims) = authorizer.authenticate(credential).await?;
        Ok(Self { subject, claims })
    }
}
