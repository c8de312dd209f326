use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lifelog_domain::{Category, DateRange, Direction, Goal, LedgerRecord, Transaction};

use crate::error::{StoreError, StoreResult};

/// Abstraction over the persistence layer holding categories, ledger rows, and goals.
///
/// Reads are owner-scoped. Writes are last-write-wins; no version column is checked.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn list_categories(&self, owner_id: Uuid) -> StoreResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn insert_category(&self, category: &Category) -> StoreResult<()>;
    async fn update_category(&self, category: &Category) -> StoreResult<()>;

    async fn list_records(
        &self,
        owner_id: Uuid,
        direction: Direction,
        range: Option<DateRange>,
    ) -> StoreResult<Vec<LedgerRecord>>;
    async fn get_record(&self, direction: Direction, id: Uuid)
        -> StoreResult<Option<LedgerRecord>>;
    async fn insert_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()>;
    async fn update_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()>;
    async fn delete_record(&self, direction: Direction, id: Uuid) -> StoreResult<LedgerRecord>;

    async fn list_goals(&self, owner_id: Uuid) -> StoreResult<Vec<Goal>>;
    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<Goal>>;
    async fn insert_goal(&self, goal: &Goal) -> StoreResult<()>;
    async fn update_goal(&self, goal: &Goal) -> StoreResult<()>;
}

/// The four collections a backend keeps. Shared by the in-memory and file-backed stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreTables {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub incomes: Vec<LedgerRecord>,
    #[serde(default)]
    pub expenses: Vec<LedgerRecord>,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

impl StoreTables {
    pub fn records(&self, direction: Direction) -> &Vec<LedgerRecord> {
        match direction {
            Direction::Income => &self.incomes,
            Direction::Expense => &self.expenses,
        }
    }

    fn records_mut(&mut self, direction: Direction) -> &mut Vec<LedgerRecord> {
        match direction {
            Direction::Income => &mut self.incomes,
            Direction::Expense => &mut self.expenses,
        }
    }

    pub fn list_categories(&self, owner_id: Uuid) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|category| category.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn get_category(&self, id: Uuid) -> Option<Category> {
        self.categories.iter().find(|c| c.id == id).cloned()
    }

    pub fn insert_category(&mut self, category: &Category) {
        self.categories.push(category.clone());
    }

    pub fn update_category(&mut self, category: &Category) -> StoreResult<()> {
        let slot = self
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or(StoreError::NotFound(category.id))?;
        *slot = category.clone();
        Ok(())
    }

    pub fn list_records(
        &self,
        owner_id: Uuid,
        direction: Direction,
        range: Option<DateRange>,
    ) -> Vec<LedgerRecord> {
        self.records(direction)
            .iter()
            .filter(|record| record.user_id == owner_id)
            .filter(|record| range.map_or(true, |range| range.contains(record.date)))
            .cloned()
            .collect()
    }

    pub fn get_record(&self, direction: Direction, id: Uuid) -> Option<LedgerRecord> {
        self.records(direction).iter().find(|r| r.id == id).cloned()
    }

    pub fn insert_record(&mut self, direction: Direction, record: &LedgerRecord) {
        self.records_mut(direction).push(record.clone());
    }

    pub fn update_record(&mut self, direction: Direction, record: &LedgerRecord) -> StoreResult<()> {
        let slot = self
            .records_mut(direction)
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(StoreError::NotFound(record.id))?;
        *slot = record.clone();
        Ok(())
    }

    pub fn delete_record(&mut self, direction: Direction, id: Uuid) -> StoreResult<LedgerRecord> {
        let records = self.records_mut(direction);
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(records.remove(index))
    }

    pub fn list_goals(&self, owner_id: Uuid) -> Vec<Goal> {
        self.goals
            .iter()
            .filter(|goal| goal.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn get_goal(&self, id: Uuid) -> Option<Goal> {
        self.goals.iter().find(|g| g.id == id).cloned()
    }

    pub fn insert_goal(&mut self, goal: &Goal) {
        self.goals.push(goal.clone());
    }

    pub fn update_goal(&mut self, goal: &Goal) -> StoreResult<()> {
        let slot = self
            .goals
            .iter_mut()
            .find(|g| g.id == goal.id)
            .ok_or(StoreError::NotFound(goal.id))?;
        *slot = goal.clone();
        Ok(())
    }
}

/// Detects transactions whose category no longer exists.
pub fn referential_gaps(transactions: &[Transaction], categories: &[Category]) -> Vec<String> {
    let category_ids: HashSet<_> = categories.iter().map(|c| c.id).collect();
    transactions
        .iter()
        .filter(|txn| !category_ids.contains(&txn.category_id))
        .map(|txn| {
            format!(
                "transaction {} references missing category {}",
                txn.id, txn.category_id
            )
        })
        .collect()
}
