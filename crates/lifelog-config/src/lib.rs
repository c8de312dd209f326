//! lifelog-config
//!
//! Persistent engine settings: owner, default date scope, data directory, log filter.

pub mod atomic;
pub mod error;
pub mod manager;
pub mod model;

pub use atomic::replace_file;
pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{Config, ScopeSetting};
