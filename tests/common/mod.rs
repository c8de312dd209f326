#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use lifelog::config::{Config, ConfigManager, ScopeSetting};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates an isolated config rooted in a unique directory, with an owner assigned.
pub fn setup_test_env(scope: ScopeSetting) -> (Config, ConfigManager) {
    let temp = TempDir::new().expect("create temp dir");
    let base: PathBuf = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let manager = ConfigManager::with_base_dir(base.clone()).expect("create config manager");
    let mut config = Config {
        default_scope: scope,
        data_dir: Some(base.join("data")),
        ..Config::default()
    };
    config.ensure_owner();
    manager.save(&config).expect("save config");
    (config, manager)
}
