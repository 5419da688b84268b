use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::Serialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

const MIN_KEY_BITS: usize = 2048;

/// A private/public RSA pair loaded under one kid.
pub struct KeyMaterial {
    private_pem: String,
    public_pem: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    modulus: String,
    exponent: String,
}

impl KeyMaterial {
    fn from_private_pem(kid: &str, pem: &[u8]) -> AuthResult<Self> {
        let invalid = |reason: String| AuthError::InvalidKeyFormat(kid.to_string(), reason);

        let text = std::str::from_utf8(pem).map_err(|err| invalid(err.to_string()))?;
        if !text.contains("-----BEGIN") {
            return Err(invalid("no PEM block found".to_string()));
        }

        let private = RsaPrivateKey::from_pkcs1_pem(text)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(text))
            .map_err(|err| invalid(format!("not an RSA private key: {err}")))?;
        if private.size() * 8 < MIN_KEY_BITS {
            return Err(invalid(format!(
                "RSA keys must be at least {MIN_KEY_BITS} bits"
            )));
        }
        let public = private.to_public_key();

        let private_pkcs1 = private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|err| invalid(err.to_string()))?;
        let public_pem = public
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|err| invalid(err.to_string()))?;

        let encoding = EncodingKey::from_rsa_pem(private_pkcs1.as_bytes())
            .map_err(|err| invalid(err.to_string()))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|err| invalid(err.to_string()))?;

        Ok(Self {
            private_pem: text.to_string(),
            public_pem,
            encoding,
            decoding,
            modulus: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        })
    }

    pub fn private_pem(&self) -> &str {
        &self.private_pem
    }

    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

/// Public half of a loaded key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Jwk {
    pub kty: &'static str,
    #[serde(rename = "use")]
    pub use_: &'static str,
    pub kid: String,
    pub alg: &'static str,
    pub n: String,
    pub e: String,
}

/// Signing and verification keys indexed by kid.
///
/// Populated during startup and then shared read-only (typically behind an `Arc`).
/// Reloading means building a fresh store and swapping the whole value.
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: HashMap<String, Arc<KeyMaterial>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a PKCS1 or PKCS8 PEM RSA private key and stores it with its public half.
    pub fn load_key(&mut self, kid: impl Into<String>, private_pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        if self.keys.contains_key(&kid) {
            return Err(AuthError::DuplicateKeyId(kid));
        }

        let material = KeyMaterial::from_private_pem(&kid, private_pem)?;
        debug!(kid = %kid, "loaded RSA key material");
        self.keys.insert(kid, Arc::new(material));
        Ok(())
    }

    pub fn private_key(&self, kid: &str) -> AuthResult<&str> {
        self.material(kid).map(KeyMaterial::private_pem)
    }

    pub fn public_key(&self, kid: &str) -> AuthResult<&str> {
        self.material(kid).map(KeyMaterial::public_pem)
    }

    pub fn material(&self, kid: &str) -> AuthResult<&KeyMaterial> {
        self.keys
            .get(kid)
            .map(|material| &**material)
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids in sorted order.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids = self.keys.keys().map(String::as_str).collect::<Vec<_>>();
        kids.sort_unstable();
        kids
    }

    /// Public keys as a JWK set, sorted by kid.
    pub fn jwks(&self) -> Vec<Jwk> {
        self.kids()
            .into_iter()
            .filter_map(|kid| {
                self.keys.get(kid).map(|material| Jwk {
                    kty: "RSA",
                    use_: "sig",
                    kid: kid.to_string(),
                    alg: "RS256",
                    n: material.modulus.clone(),
                    e: material.exponent.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{NOT_RSA_PEM, PRIMARY_PEM, SECONDARY_PEM};

    #[test]
    fn loads_pkcs8_and_pkcs1_keys() {
        let mut store = KeyStore::new();
        store.load_key("pkcs8", PRIMARY_PEM.as_bytes()).expect("pkcs8 key");
        store.load_key("pkcs1", SECONDARY_PEM.as_bytes()).expect("pkcs1 key");

        assert_eq!(store.kids(), vec!["pkcs1", "pkcs8"]);
        assert_eq!(store.private_key("pkcs8").unwrap(), PRIMARY_PEM);
        assert!(store
            .public_key("pkcs1")
            .unwrap()
            .starts_with("-----BEGIN RSA PUBLIC KEY-----"));
    }

    #[test]
    fn unknown_kid_is_key_not_found() {
        let store = KeyStore::new();
        assert!(matches!(store.private_key("nope"), Err(AuthError::KeyNotFound(kid)) if kid == "nope"));
        assert!(matches!(store.public_key("nope"), Err(AuthError::KeyNotFound(_))));
    }

    #[test]
    fn rejects_missing_pem_block() {
        let mut store = KeyStore::new();
        let err = store.load_key("k1", b"not a key").expect_err("no pem block");
        assert!(matches!(err, AuthError::InvalidKeyFormat(kid, _) if kid == "k1"));
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_non_rsa_key() {
        let mut store = KeyStore::new();
        let err = store
            .load_key("ec", NOT_RSA_PEM.as_bytes())
            .expect_err("ec key is not rsa");
        assert!(matches!(err, AuthError::InvalidKeyFormat(_, _)));
    }

    #[test]
    fn kid_cannot_be_replaced() {
        let mut store = KeyStore::new();
        store.load_key("k1", PRIMARY_PEM.as_bytes()).unwrap();
        let err = store
            .load_key("k1", SECONDARY_PEM.as_bytes())
            .expect_err("duplicate kid");
        assert!(matches!(err, AuthError::DuplicateKeyId(_)));
        assert_eq!(store.private_key("k1").unwrap(), PRIMARY_PEM);
    }

    #[test]
    fn jwks_exposes_public_components() {
        let mut store = KeyStore::new();
        store.load_key("k1", PRIMARY_PEM.as_bytes()).unwrap();

        let jwks = store.jwks();
        assert_eq!(jwks.len(), 1);
        assert_eq!(jwks[0].kid, "k1");
        assert_eq!(jwks[0].alg, "RS256");
        assert_eq!(jwks[0].e, "AQAB");
        assert!(!jwks[0].n.is_empty());
    }
}
