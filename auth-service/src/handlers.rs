use axum::extract::{Path, Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use common_auth::{AuthError, Claims, Jwk, Role, BASIC_SCHEME, BEARER_SCHEME};
use common_security::{AuthContext, Rule, SecurityError};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub kid: String,
    pub token_type: &'static str,
    pub expires_at: String,
}

/// Exchanges Basic credentials for a token signed with the active kid.
pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, SecurityError> {
    let kid = state.config.active_kid.clone();
    token_response(&state, &headers, kid).await
}

/// Exchanges Basic credentials for a token signed with `kid`.
pub async fn issue_token_for_kid(
    State(state): State<AppState>,
    Path(kid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, SecurityError> {
    token_response(&state, &headers, kid).await
}

async fn token_response(
    state: &AppState,
    headers: &HeaderMap,
    kid: String,
) -> Result<Json<TokenResponse>, SecurityError> {
    let credential = credential_from(headers)?;
    if scheme_of(credential) != BASIC_SCHEME {
        state.metrics.authentication(scheme_of(credential), "rejected");
        return Err(SecurityError::Unauthenticated(AuthError::MalformedHeader));
    }

    let (subject, claims) = state.authorizer.authenticate(credential).await?;

    let token = state.authorizer.generate_token(&kid, &claims)?;
    state.metrics.token_issued(&kid);
    info!(%subject, kid = %kid, "issued token");

    Ok(Json(TokenResponse {
        token,
        kid,
        token_type: BEARER_SCHEME,
        expires_at: rfc3339(claims.expires_at),
    }))
}

#[derive(Debug, Serialize)]
pub struct IntrospectResponse {
    pub subject: Uuid,
    pub roles: Vec<Role>,
    pub issuer: String,
    pub issued_at: String,
    pub expires_at: String,
}

impl From<Claims> for IntrospectResponse {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.subject,
            roles: claims.roles,
            issuer: claims.issuer,
            issued_at: rfc3339(claims.issued_at),
            expires_at: rfc3339(claims.expires_at),
        }
    }
}

/// Returns the decoded claims of the presented token.
pub async fn introspect(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<IntrospectResponse>, SecurityError> {
    ctx.require(&state.authorizer, None, Rule::Any)?;
    Ok(Json(IntrospectResponse::from(ctx.into_claims())))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub owner: Option<Uuid>,
}

/// Policy decision for the caller: 204 when `rule` allows, 403 otherwise.
pub async fn authorize(
    State(state): State<AppState>,
    Path(rule): Path<String>,
    Query(query): Query<AuthorizeQuery>,
    ctx: AuthContext,
) -> Result<StatusCode, SecurityError> {
    let result = state
        .authorizer
        .authorize_named(&ctx.claims, query.owner, &rule);
    state.metrics.authorization(&rule_label(&rule), result.is_ok());
    result.map(|()| StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

pub async fn jwks(State(state): State<AppState>) -> Json<JwksResponse> {
    Json(JwksResponse {
        keys: state.authorizer.jwks(),
    })
}

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn credential_from(headers: &HeaderMap) -> Result<&str, SecurityError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .ok_or(SecurityError::Unauthenticated(AuthError::MalformedHeader))
}

fn scheme_of(credential: &str) -> &str {
    match credential.split_once(' ') {
        Some((BASIC_SCHEME, _)) => BASIC_SCHEME,
        Some((BEARER_SCHEME, _)) => BEARER_SCHEME,
        _ => "unknown",
    }
}

// Keeps the metric label set closed even when callers send arbitrary rule names.
fn rule_label(rule: &str) -> String {
    rule.parse::<Rule>()
        .map(|rule| rule.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
