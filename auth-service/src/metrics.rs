use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_security::AuthenticationObserver;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    authentications: IntCounterVec,
    authorizations: IntCounterVec,
    tokens_issued: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let authentications = IntCounterVec::new(
            Opts::new(
                "auth_authentications_total",
                "Count of authentication attempts grouped by scheme and outcome",
            ),
            &["scheme", "outcome"],
        )?;
        registry.register(Box::new(authentications.clone()))?;

        let authorizations = IntCounterVec::new(
            Opts::new(
                "auth_authorizations_total",
                "Count of policy evaluations grouped by rule and outcome",
            ),
            &["rule", "outcome"],
        )?;
        registry.register(Box::new(authorizations.clone()))?;

        let tokens_issued = IntCounterVec::new(
            Opts::new("auth_tokens_issued_total", "Count of signed tokens issued per kid"),
            &["kid"],
        )?;
        registry.register(Box::new(tokens_issued.clone()))?;

        Ok(Self {
            registry,
            authentications,
            authorizations,
            tokens_issued,
        })
    }

    pub fn authentication(&self, scheme: &str, outcome: &str) {
        self.authentications
            .with_label_values(&[scheme, outcome])
            .inc();
    }

    pub fn authorization(&self, rule: &str, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "denied" };
        self.authorizations.with_label_values(&[rule, outcome]).inc();
    }

    pub fn token_issued(&self, kid: &str) {
        self.tokens_issued.with_label_values(&[kid]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

impl AuthenticationObserver for AuthMetrics {
    fn authenticated(&self, scheme: &str, succeeded: bool) {
        self.authentication(scheme, if succeeded { "success" } else { "failure" });
    }
}
