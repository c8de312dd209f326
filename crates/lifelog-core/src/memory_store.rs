//! In-process [`LedgerStore`] backed by [`StoreTables`].

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use lifelog_domain::{Category, DateRange, Direction, Goal, LedgerRecord};

use crate::{
    error::StoreResult,
    storage::{LedgerStore, StoreTables},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<StoreTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: StoreTables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> StoreTables {
        self.tables.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn list_categories(&self, owner_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(self.tables.read().await.list_categories(owner_id))
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.tables.read().await.get_category(id))
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        self.tables.write().await.insert_category(category);
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        self.tables.write().await.update_category(category)
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
        self.tables.write().await.insert_record(direction, record);
        Ok(())
    }

    async fn update_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()> {
        self.tables.write().await.update_record(direction, record)
    }

    async fn delete_record(&self, direction: Direction, id: Uuid) -> StoreResult<LedgerRecord> {
        self.tables.write().await.delete_record(direction, id)
    }

    async fn list_goals(&self, owner_id: Uuid) -> StoreResult<Vec<Goal>> {
        Ok(self.tables.read().await.list_goals(owner_id))
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<Goal>> {
        Ok(self.tables.read().await.get_goal(id))
    }

    async fn insert_goal(&self, goal: &Goal) -> StoreResult<()> {
        self.tables.write().await.insert_goal(goal);
        Ok(())
    }

    async fn update_goal(&self, goal: &Goal) -> StoreResult<()> {
        self.tables.write().await.update_goal(goal)
    }
}
