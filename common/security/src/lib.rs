pub mod authorizer;
pub mod context;
pub mod error;
pub mod policy;

pub use authorizer::{AuthenticationObserver, Authorizer};
pub use context::AuthContext;
pub use error::SecurityError;
pub use policy::{authorize, authorize_named, evaluate, Decision, Denial, PolicyError, Rule};
