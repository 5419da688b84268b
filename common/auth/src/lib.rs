pub mod claims;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod keystore;
pub mod roles;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testutil;

pub use claims::Claims;
pub use codec::{TokenCodec, BEARER_SCHEME};
pub use config::{CredentialConfig, JwtConfig};
pub use credentials::{
    hash_password, verify_password, CredentialVerifier, DirectoryUser, InMemoryUserDirectory,
    UserDirectory, BASIC_SCHEME,
};
pub use error::{AuthError, AuthResult};
pub use keystore::{Jwk, KeyMaterial, KeyStore};
pub use roles::{Role, ROLE_ADMIN, ROLE_USER};
