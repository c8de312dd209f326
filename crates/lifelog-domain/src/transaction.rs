//! Domain models for ledger rows and direction-tagged transactions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A stored income or expense row. The direction is implied by the collection it lives in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    /// Minor currency units.
    pub amount: u64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn new(
        user_id: Uuid,
        category_id: Uuid,
        name: impl Into<String>,
        amount: u64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            category_id,
            name: name.into(),
            amount,
            date,
            created_at: Utc::now(),
        }
    }

    /// Tags the row with the collection it was read from.
    pub fn tagged(self, direction: Direction) -> Transaction {
        Transaction {
            id: self.id,
            owner_id: self.user_id,
            category_id: self.category_id,
            name: self.name,
            amount: self.amount,
            date: self.date,
            direction,
        }
    }
}

/// A ledger entry with its direction carried as a first-class field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub amount: u64,
    pub date: NaiveDate,
    pub direction: Direction,
}

impl Transaction {
    pub fn new(
        owner_id: Uuid,
        category_id: Uuid,
        name: impl Into<String>,
        amount: u64,
        date: NaiveDate,
        direction: Direction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            category_id,
            name: name.into(),
            amount,
            date,
            direction,
        }
    }

    /// Splits the transaction back into its storage row and target collection.
    pub fn into_record(self, created_at: DateTime<Utc>) -> (Direction, LedgerRecord) {
        (
            self.direction,
            LedgerRecord {
                id: self.id,
                user_id: self.owner_id,
                category_id: self.category_id,
                name: self.name,
                amount: self.amount,
                date: self.date,
                created_at,
            },
        )
    }
}

/// Field changes applied by a transaction edit. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionChanges {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub amount: Option<u64>,
    pub date: Option<NaiveDate>,
}

impl TransactionChanges {
    pub fn apply(&self, txn: &mut Transaction) {
        if let Some(category_id) = self.category_id {
            txn.category_id = category_id;
        }
        if let Some(name) = &self.name {
            txn.name = name.clone();
        }
        if let Some(amount) = self.amount {
            txn.amount = amount;
        }
        if let Some(date) = self.date {
            txn.date = date;
        }
    }
}
