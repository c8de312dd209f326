use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use uuid::Uuid;

const DATA_DIR_NAME: &str = "lifelog";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Owner whose ledger a session opens. `None` until first run assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub default_scope: ScopeSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom directory for the ledger store. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Config {
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join(DATA_DIR_NAME)
    }

    /// Returns the stored owner, generating and recording one if absent.
    pub fn ensure_owner(&mut self) -> Uuid {
        *self.owner_id.get_or_insert_with(Uuid::new_v4)
    }
}

/// Which slice of the ledger summaries show when the caller does not choose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeSetting {
    #[default]
    Unscoped,
    Month,
    Day,
}

impl fmt::Display for ScopeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScopeSetting::Unscoped => "unscoped",
            ScopeSetting::Month => "month",
            ScopeSetting::Day => "day",
        };
        f.write_str(label)
    }
}
