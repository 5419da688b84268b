//! Fixtures shared by unit tests and, via the `test-helpers` feature, by other crates.
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::JwtConfig;
use crate::codec::TokenCodec;
use crate::keystore::KeyStore;

/// 2048-bit RSA key, PKCS8 encoded.
pub const PRIMARY_PEM: &str = include_str!("../testdata/primary_pkcs8.pem");
/// 2048-bit RSA key, PKCS1 encoded.
pub const SECONDARY_PEM: &str = include_str!("../testdata/secondary_pkcs1.pem");
/// P-256 key in a PKCS8 envelope.
pub const NOT_RSA_PEM: &str = include_str!("../testdata/not_rsa_ec.pem");

pub const TEST_ISSUER: &str = "test-issuer";

/// Builds a store from `(kid, pem)` pairs. Panics on bad fixtures.
pub fn key_store(keys: &[(&str, &str)]) -> KeyStore {
    let mut store = KeyStore::new();
    for (kid, pem) in keys {
        store
            .load_key(*kid, pem.as_bytes())
            .unwrap_or_else(|err| panic!("fixture key {kid}: {err}"));
    }
    store
}

pub fn codec(keys: &[(&str, &str)]) -> TokenCodec {
    TokenCodec::new(JwtConfig::new(TEST_ISSUER), Arc::new(key_store(keys)))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}
