use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use lifelog_config::replace_file;
use lifelog_core::{LedgerStore, StoreError, StoreResult, StoreTables};
use lifelog_domain::{Category, DateRange, Direction, Goal, LedgerRecord};

/// Single-file JSON persistence for categories, ledger rows, and goals.
///
/// Every write is applied to a copy of the tables, persisted with a temp-file rename, and only
/// then swapped in. A failed write leaves both the file and the in-memory state untouched.
#[derive(Debug)]
pub struct JsonStore {
    path: Arc<Path>,
    tables: RwLock<StoreTables>,
}

impl JsonStore {
    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = if path.exists() {
            load_tables(&path)?
        } else {
            StoreTables::default()
        };
        tracing::debug!(path = %path.display(), "json store opened");
        Ok(Self {
            path: path.into(),
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreTables) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut current = self.tables.write().await;
        let mut next = current.clone();
        let out = apply(&mut next)?;
        let data = encode(&next)?;
        // The write lock stays held so file writes land in the same order as mutations.
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || replace_file(&path, &data))
            .await
            .map_err(|err| StoreError::Unavailable(format!("write task failed: {err}")))??;
        *current = next;
        Ok(out)
    }
}

#[async_trait]
impl LedgerStore for JsonStore {
    async fn list_categories(&self, owner_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(self.tables.read().await.list_categories(owner_id))
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.tables.read().await.get_category(id))
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.insert_category(category);
            Ok(())
        })
        .await
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        self.mutate(|tables| tables.update_category(category)).await
    }

    async fn list_records(
        &self,
        owner_id: Uuid,
        direction: Direction,
        range: Option<DateRange>,
    ) -> StoreResult<Vec<LedgerRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .list_records(owner_id, direction, range))
    }

    async fn get_record(
        &self,
        direction: Direction,
        id: Uuid,
    ) -> StoreResult<Option<LedgerRecord>> {
        Ok(self.tables.read().await.get_record(direction, id))
    }

    async fn insert_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.insert_record(direction, record);
            Ok(())
        })
        .await
    }

    async fn update_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()> {
        self.mutate(|tables| tables.update_record(direction, record))
            .await
    }

    async fn delete_record(&self, direction: Direction, id: Uuid) -> StoreResult<LedgerRecord> {
        self.mutate(|tables| tables.delete_record(direction, id))
            .await
    }

    async fn list_goals(&self, owner_id: Uuid) -> StoreResult<Vec<Goal>> {
        Ok(self.tables.read().await.list_goals(owner_id))
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<Goal>> {
        Ok(self.tables.read().await.get_goal(id))
    }

    async fn insert_goal(&self, goal: &Goal) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.insert_goal(goal);
            Ok(())
        })
        .await
    }

    async fn update_goal(&self, goal: &Goal) -> StoreResult<()> {
        self.mutate(|tables| tables.update_goal(goal)).await
    }
}

/// Reads the tables stored at `path`.
pub fn load_tables(path: &Path) -> StoreResult<StoreTables> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| StoreError::Serde(err.to_string()))
}

/// Writes the tables to `path` through a sibling temp file.
pub fn save_tables(path: &Path, tables: &StoreTables) -> StoreResult<()> {
    replace_file(path, &encode(tables)?)?;
    Ok(())
}

fn encode(tables: &StoreTables) -> StoreResult<String> {
    serde_json::to_string_pretty(tables).map_err(|err| StoreError::Serde(err.to_string()))
}
