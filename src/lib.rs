#![doc(test(attr(deny(warnings))))]

//! Lifelog tracks a personal income/expense ledger, summarises it, and keeps
//! challenge goals in sync with the transactions they measure.

pub mod errors;
pub mod session;
pub mod utils;

pub use lifelog_config as config;
pub use lifelog_core as core;
pub use lifelog_domain as domain;
pub use lifelog_storage_json as storage;

pub use errors::LifelogError;
pub use session::{NotifierTask, Session};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter and emits a startup info log.
pub fn init() {
    init_with(None);
}

/// Like [`init`], using `config.log_filter` when `RUST_LOG` is unset.
pub fn init_from_config(config: &config::Config) {
    init_with(config.log_filter.as_deref());
}

fn init_with(directive: Option<&str>) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(directive);
        tracing::info!("Lifelog tracing initialized.");
    });
}
