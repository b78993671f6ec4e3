pub mod bound;
pub mod config;
pub mod entry;
pub mod normalize;
pub mod progress;
pub mod pump;
pub mod relevance;
pub mod sink;

use thiserror::Error;

pub use entry::{PackageEntry, VersionEntry};

/// Anything that stops the follower before it reaches the end sequence.
#[derive(Debug, Error)]
pub enum FollowerError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("failed to resolve end sequence: {0}")]
    Resolve(#[from] bound::ResolveError),
    #[error("failed to subscribe to changes feed: {0}")]
    Subscribe(String),
    #[error(transparent)]
    Pump(#[from] pump::PumpError),
    #[error(transparent)]
    ProcessGuard(#[from] utils::ProcessGuardError),
}
