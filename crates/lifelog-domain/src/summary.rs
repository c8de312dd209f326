//! Aggregate statistics derived from a ledger snapshot. Never persisted.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{category::CategoryKind, common::Direction};

/// Label used when a transaction references a category that does not exist.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
/// Totals for one direction, split by fixedness.
pub struct DirectionTotals {
    pub fixed: u64,
    pub variable: u64,
    pub total: u64,
    pub count: usize,
}

impl DirectionTotals {
    pub fn add(&mut self, amount: u64, fixed: bool) {
        if fixed {
            self.fixed += amount;
        } else {
            self.variable += amount;
        }
        self.total += amount;
        self.count += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Per-category totals with share of all money moved in scope.
pub struct CategoryTotal {
    pub amount: u64,
    pub count: usize,
    /// `None` when the category could not be resolved.
    pub kind: Option<CategoryKind>,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
/// Calendar cell totals.
pub struct DailyTotal {
    pub income: u64,
    pub expense: u64,
    pub net: i64,
}

impl DailyTotal {
    pub fn add(&mut self, direction: Direction, amount: u64) {
        match direction {
            Direction::Income => self.income += amount,
            Direction::Expense => self.expense += amount,
        }
        self.net = signed_difference(self.income, self.expense);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartPoint {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
/// One `{name, value}` series per direction, summed per category name.
pub struct ChartSeries {
    pub income: Vec<ChartPoint>,
    pub expense: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn for_direction(&self, direction: Direction) -> &[ChartPoint] {
        match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expense,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
/// Complete statistics for one scoped snapshot of the ledger.
pub struct LedgerSummary {
    pub income: DirectionTotals,
    pub expense: DirectionTotals,
    pub net: i64,
    pub categories: BTreeMap<String, CategoryTotal>,
    pub daily: BTreeMap<NaiveDate, DailyTotal>,
    pub chart: ChartSeries,
}

impl LedgerSummary {
    /// Zeroed summary reported when the snapshot could not be read.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn totals(&self, direction: Direction) -> &DirectionTotals {
        match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expense,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.income.count == 0 && self.expense.count == 0
    }
}

/// `a - b` without overflowing on large minor-unit values.
pub fn signed_difference(a: u64, b: u64) -> i64 {
    let diff = i128::from(a) - i128::from(b);
    diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
