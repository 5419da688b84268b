use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::keystore::KeyStore;

pub const BEARER_SCHEME: &str = "Bearer";

/// Issues and verifies RS256 tokens whose header names the signing kid.
#[derive(Clone)]
pub struct TokenCodec {
    config: JwtConfig,
    store: Arc<KeyStore>,
}

impl TokenCodec {
    pub fn new(config: JwtConfig, store: Arc<KeyStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn generate_token(&self, kid: &str, claims: &Claims) -> AuthResult<String> {
        let material = self
            .store
            .material(kid)
            .map_err(|_| AuthError::SigningKeyUnavailable(kid.to_string()))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());

        let token = encode(&header, &claims.to_repr(), material.encoding_key())
            .map_err(|err| AuthError::Signing(err.to_string()))?;
        debug!(kid, subject = %claims.subject, "issued JWT");
        Ok(token)
    }

    /// Validates an `Authorization` header value of the form `Bearer <token>`.
    pub fn authenticate(&self, header_value: &str) -> AuthResult<Claims> {
        let token = parse_bearer(header_value)?;
        self.verify(token)
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let (header_segment, _, signature) = split_segments(token)?;
        let header = decode_header_segment(header_segment)?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let material = self.store.material(&kid)?;

        // Anything after the second '.' is signature; stray bytes there are a bad signature.
        if !is_base64url(signature) {
            return Err(AuthError::InvalidSignature);
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, material.decoding_key(), &validation)?;
        let claims = Claims::try_from(token_data.claims)?;

        // jsonwebtoken accepts exp == now; a token must expire strictly in the future.
        let cutoff = Utc::now() - Duration::seconds(self.config.leeway_seconds.into());
        if claims.is_expired_at(cutoff) {
            return Err(AuthError::TokenExpired);
        }

        debug!(kid, subject = %claims.subject, "verified JWT successfully");
        Ok(claims)
    }
}

fn split_segments(token: &str) -> AuthResult<(&str, &str, &str)> {
    let mut segments = token.splitn(3, '.');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(payload), Some(signature)) => Ok((header, payload, signature)),
        _ => Err(AuthError::MalformedHeader),
    }
}

fn decode_header_segment(segment: &str) -> AuthResult<Header> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedHeader)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedHeader)
}

fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
}

pub(crate) fn parse_bearer(value: &str) -> AuthResult<&str> {
    let parts = value.split(' ').collect::<Vec<_>>();
    match parts.as_slice() {
        [scheme, token] if *scheme == BEARER_SCHEME && !token.is_empty() => Ok(*token),
        _ => Err(AuthError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::testutil::{bearer, codec, key_store, PRIMARY_PEM, SECONDARY_PEM, TEST_ISSUER};
    use uuid::Uuid;

    fn user_claims(ttl: Duration) -> Claims {
        Claims::issue(Uuid::new_v4(), [Role::User], TEST_ISSUER, ttl).expect("claims")
    }

    #[test]
    fn parse_bearer_accepts_valid_token() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn parse_bearer_rejects_wrong_scheme_and_shape() {
        for value in ["Basic credentials", "Bearer", "Bearertoken", "Bearer a b", "Bearer ", ""] {
            assert!(
                matches!(parse_bearer(value), Err(AuthError::MalformedHeader)),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn round_trip_preserves_claims() {
        let codec = codec(&[("k1", PRIMARY_PEM)]);
        let claims = user_claims(Duration::hours(1));

        let token = codec.generate_token("k1", &claims).expect("sign");
        let verified = codec.authenticate(&bearer(&token)).expect("verify");

        assert_eq!(verified, claims);
    }

    #[test]
    fn generate_with_unknown_kid_is_signing_key_unavailable() {
        let codec = codec(&[("k1", PRIMARY_PEM)]);
        let err = codec
            .generate_token("missing", &user_claims(Duration::hours(1)))
            .expect_err("no key");
        assert!(matches!(err, AuthError::SigningKeyUnavailable(kid) if kid == "missing"));
    }

    #[test]
    fn header_without_space_is_malformed() {
        let codec = codec(&[("k1", PRIMARY_PEM)]);
        let token = codec
            .generate_token("k1", &user_claims(Duration::hours(1)))
            .unwrap();
        let err = codec
            .authenticate(&format!("Bearer{token}"))
            .expect_err("one part");
        assert!(matches!(err, AuthError::MalformedHeader));
    }

    #[test]
    fn token_signed_under_unknown_kid_is_key_not_found() {
        let signer = codec(&[("unknown", PRIMARY_PEM)]);
        let verifier = codec(&[("k1", PRIMARY_PEM)]);
        let token = signer
            .generate_token("unknown", &user_claims(Duration::hours(1)))
            .unwrap();

        let err = verifier.authenticate(&bearer(&token)).expect_err("kid unknown");
        assert!(matches!(err, AuthError::KeyNotFound(kid) if kid == "unknown"));
    }

    #[test]
    fn token_signed_by_other_key_fails_signature() {
        let signer = codec(&[("k1", SECONDARY_PEM)]);
        let verifier = codec(&[("k1", PRIMARY_PEM)]);
        let token = signer
            .generate_token("k1", &user_claims(Duration::hours(1)))
            .unwrap();

        let err = verifier.authenticate(&bearer(&token)).expect_err("wrong key");
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec(&[("k1", PRIMARY_PEM)]);
        let now = Utc::now();
        let claims = Claims::new(
            Uuid::new_v4(),
            [Role::Admin],
            TEST_ISSUER,
            now - Duration::hours(2),
            now - Duration::hours(1),
        );
        let token = codec.generate_token("k1", &claims).unwrap();

        let err = codec.authenticate(&bearer(&token)).expect_err("expired");
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let store = Arc::new(key_store(&[("k1", PRIMARY_PEM)]));
        let codec = TokenCodec::new(JwtConfig::new(TEST_ISSUER), store);
        let claims = Claims::issue(Uuid::new_v4(), [Role::User], "someone-else", Duration::hours(1))
            .expect("claims");
        let token = codec.generate_token("k1", &claims).unwrap();

        let err = codec.verify(&token).expect_err("issuer mismatch");
        assert!(matches!(err, AuthError::InvalidIssuer));
    }

    #[test]
    fn dot_inside_signature_is_invalid_signature() {
        let codec = codec(&[("k1", PRIMARY_PEM)]);
        let token = codec
            .generate_token("k1", &user_claims(Duration::hours(1)))
            .unwrap();
        let signature_start = token.rfind('.').unwrap() + 1;

        let mut tampered = token.clone().into_bytes();
        tampered[signature_start + 10] = b'.';
        let tampered = String::from_utf8(tampered).unwrap();
        let err = codec.verify(&tampered).expect_err("dot in signature");
        assert!(matches!(err, AuthError::InvalidSignature), "{err:?}");

        let err = codec.verify(&format!("{token}.extra")).expect_err("fourth segment");
        assert!(matches!(err, AuthError::InvalidSignature), "{err:?}");
    }

    #[test]
    fn garbage_token_is_malformed() {
        let codec = codec(&[("k1", PRIMARY_PEM)]);
        let err = codec.authenticate("Bearer not-a-jwt").expect_err("garbage");
        assert!(matches!(err, AuthError::MalformedHeader));
    }
}
