pub mod app;
pub mod config;
pub mod directory;
pub mod handlers;
pub mod keys;
pub mod metrics;

pub use app::{build_router, AppState};
