//! Loading the merged income/expense ledger and mutating its transactions.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use lifelog_domain::{
    Category, DateRange, DateScope, Direction, Transaction, TransactionChanges, UNKNOWN_CATEGORY,
};

use crate::{
    events::{EventBus, LedgerEvent},
    storage::{referential_gaps, LedgerStore},
    CoreError, CoreResult,
};

/// One consistent read of an owner's transactions and categories.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub transactions: Vec<Transaction>,
    pub categories: Vec<Category>,
}

/// Provides owner-scoped reads of the merged ledger and validated transaction mutations.
///
/// Every successful mutation publishes [`LedgerEvent::LedgerMutated`] on the bus.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    bus: EventBus,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Reads incomes, expenses, and categories concurrently; any failure fails the whole load.
    pub async fn load(&self, owner_id: Uuid, scope: DateScope) -> CoreResult<LedgerSnapshot> {
        let range = scope.range();
        let (incomes, expenses, categories) = tokio::try_join!(
            self.read_records(owner_id, Direction::Income, range),
            self.read_records(owner_id, Direction::Expense, range),
            async {
                self.store
                    .list_categories(owner_id)
                    .await
                    .map_err(CoreError::read("load categories"))
            },
        )?;

        let mut transactions: Vec<Transaction> = incomes.into_iter().chain(expenses).collect();
        transactions.sort_by_key(|txn| txn.date);

        for warning in referential_gaps(&transactions, &categories) {
            tracing::debug!(%warning, "referential gap");
        }
        tracing::debug!(
            owner_id = %owner_id,
            scope = %scope,
            transactions = transactions.len(),
            "ledger loaded"
        );
        Ok(LedgerSnapshot {
            transactions,
            categories,
        })
    }

    /// Reads one collection, tagging every row with its direction.
    async fn read_records(
        &self,
        owner_id: Uuid,
        direction: Direction,
        range: Option<DateRange>,
    ) -> CoreResult<Vec<Transaction>> {
        let operation = match direction {
            Direction::Income => "load incomes",
            Direction::Expense => "load expenses",
        };
        let records = self
            .store
            .list_records(owner_id, direction, range)
            .await
            .map_err(CoreError::read(operation))?;
        Ok(records
            .into_iter()
            .map(|record| record.tagged(direction))
            .collect())
    }

    pub async fn get(&self, direction: Direction, id: Uuid) -> CoreResult<Transaction> {
        self.store
            .get_record(direction, id)
            .await
            .map_err(CoreError::read("load transaction"))?
            .map(|record| record.tagged(direction))
            .ok_or(CoreError::TransactionNotFound(id))
    }

    /// Adds a new transaction and returns it as stored.
    pub async fn create(&self, transaction: Transaction) -> CoreResult<Transaction> {
        let category = self.validate(&transaction).await?;
        if category.is_deleted() {
            return Err(CoreError::Validation(format!(
                "category `{}` is deleted; restore it first",
                category.name
            )));
        }
        let (direction, record) = transaction.clone().into_record(Utc::now());
        self.store
            .insert_record(direction, &record)
            .await
            .map_err(CoreError::write("create transaction"))?;
        tracing::debug!(transaction_id = %transaction.id, %direction, "transaction created");
        self.notify(transaction.owner_id, &category.name, direction);
        Ok(transaction)
    }

    /// Applies `changes` to an existing transaction. Direction cannot change.
    pub async fn update(
        &self,
        direction: Direction,
        id: Uuid,
        changes: TransactionChanges,
    ) -> CoreResult<Transaction> {
        let record = self
            .store
            .get_record(direction, id)
            .await
            .map_err(CoreError::read("load transaction"))?
            .ok_or(CoreError::TransactionNotFound(id))?;
        let created_at = record.created_at;
        let before = record.tagged(direction);
        let mut after = before.clone();
        changes.apply(&mut after);
        let category = self.validate(&after).await?;
        if category.is_deleted() && before.category_id != after.category_id {
            return Err(CoreError::Validation(format!(
                "category `{}` is deleted; restore it first",
                category.name
            )));
        }

        let (_, updated) = after.clone().into_record(created_at);
        self.store
            .update_record(direction, &updated)
            .await
            .map_err(CoreError::write("update transaction"))?;
        tracing::debug!(transaction_id = %id, %direction, "transaction updated");

        if before.category_id != after.category_id {
            let previous = self.category_name(before.category_id).await;
            self.notify(before.owner_id, &previous, direction);
        }
        self.notify(after.owner_id, &category.name, direction);
        Ok(after)
    }

    /// Removes a transaction, returning the removed instance.
    pub async fn delete(&self, direction: Direction, id: Uuid) -> CoreResult<Transaction> {
        let removed = self
            .store
            .delete_record(direction, id)
            .await
            .map_err(|source| match source {
                crate::StoreError::NotFound(_) => CoreError::TransactionNotFound(id),
                other => CoreError::write("delete transaction")(other),
            })?
            .tagged(direction);
        tracing::debug!(transaction_id = %id, %direction, "transaction deleted");
        let name = self.category_name(removed.category_id).await;
        self.notify(removed.owner_id, &name, direction);
        Ok(removed)
    }

    async fn validate(&self, transaction: &Transaction) -> CoreResult<Category> {
        if transaction.name.trim().is_empty() {
            return Err(CoreError::Validation("transaction name cannot be empty".into()));
        }
        let category = self
            .store
            .get_category(transaction.category_id)
            .await
            .map_err(CoreError::read("load category"))?
            .filter(|c| c.owner_id == transaction.owner_id)
            .ok_or(CoreError::CategoryNotFound(transaction.category_id))?;
        if category.direction() != transaction.direction {
            return Err(CoreError::Validation(format!(
                "category `{}` is {} but the transaction is {}",
                category.name,
                category.kind,
                transaction.direction
            )));
        }
        Ok(category)
    }

    async fn category_name(&self, id: Uuid) -> String {
        match self.store.get_category(id).await {
            Ok(Some(category)) => category.name,
            Ok(None) => UNKNOWN_CATEGORY.to_string(),
            Err(err) => {
                tracing::warn!(category_id = %id, error = %err, "could not resolve category name");
                UNKNOWN_CATEGORY.to_string()
            }
        }
    }

    fn notify(&self, owner_id: Uuid, category_name: &str, direction: Direction) {
        self.bus.publish(LedgerEvent::LedgerMutated {
            owner_id,
            category_name: category_name.to_string(),
            direction,
        });
    }
}
