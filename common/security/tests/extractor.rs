use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::Duration;
use common_auth::testutil::{bearer, codec, PRIMARY_PEM, TEST_ISSUER};
use common_auth::{Claims, Role};
use common_security::{AuthContext, Authorizer, Rule, SecurityError};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

async fn whoami(ctx: AuthContext) -> String {
    ctx.subject.to_string()
}

async fn owned(
    State(authorizer): State<Arc<Authorizer>>,
    Path(owner): Path<Uuid>,
    ctx: AuthContext,
) -> Result<&'static str, SecurityError> {
    ctx.require(&authorizer, Some(owner), Rule::AdminOrSubject)?;
    Ok("ok")
}

fn app(authorizer: Arc<Authorizer>) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/owned/:owner", get(owned))
        .with_state(authorizer)
}

fn token_for(authorizer: &Authorizer, subject: Uuid, roles: &[Role]) -> String {
    let claims = Claims::issue(subject, roles.iter().copied(), TEST_ISSUER, Duration::hours(1))
        .expect("claims");
    authorizer.generate_token("k1", &claims).expect("token")
}

async fn send(app: Router, uri: &str, credential: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().uri(uri);
    if let Some(credential) = credential {
        request = request.header(AUTHORIZATION, credential);
    }
    let response = app
        .oneshot(request.body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, body)
}

#[tokio::test]
async fn extractor_resolves_subject_from_bearer_token() {
    let authorizer = Arc::new(Authorizer::new(codec(&[("k1", PRIMARY_PEM)])));
    let subject = Uuid::new_v4();
    let token = token_for(&authorizer, subject, &[Role::User]);

    let (status, body) = send(app(authorizer), "/whoami", Some(&bearer(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), subject.to_string());
}

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let authorizer = Arc::new(Authorizer::new(codec(&[("k1", PRIMARY_PEM)])));
    let (status, body) = send(app(authorizer), "/whoami", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert_eq!(body["message"], "unauthenticated");
}

#[tokio::test]
async fn subject_rule_is_enforced_per_resource() {
    let authorizer = Arc::new(Authorizer::new(codec(&[("k1", PRIMARY_PEM)])));
    let subject = Uuid::new_v4();
    let token = bearer(&token_for(&authorizer, subject, &[Role::User]));

    let (status, _) = send(app(authorizer.clone()), &format!("/owned/{subject}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let other = Uuid::new_v4();
    let (status, body) = send(app(authorizer), &format!("/owned/{other}"), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(body["message"], "permission denied");
}
