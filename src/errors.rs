use thiserror::Error;

use lifelog_config::ConfigError;
use lifelog_core::{CoreError, StoreError};

/// Failures while opening or driving a [`crate::Session`].
#[derive(Debug, Error)]
pub enum LifelogError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to open ledger store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("No owner configured; call `Config::ensure_owner` first")]
    MissingOwner,
}
