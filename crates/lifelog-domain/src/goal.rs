//! Goal ("challenge") definitions and the completion rules applied to them.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A user-declared target tied to a category, evaluated against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub category_name: String,
    pub goal_type: GoalType,
    pub challenge_mode: ChallengeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_count: Option<u32>,
    /// Cached result of the last evaluation.
    #[serde(default)]
    pub current_amount: u64,
    #[serde(default)]
    pub current_count: u32,
    pub target_date: NaiveDate,
    pub created_from_date: NaiveDate,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(
        owner_id: Uuid,
        category_name: impl Into<String>,
        goal_type: GoalType,
        challenge_mode: ChallengeMode,
        created_from_date: NaiveDate,
        target_date: NaiveDate,
    ) -> Self {
        let category_name = category_name.into();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: format!("{} {}", goal_type.verb(), category_name),
            category_name,
            goal_type,
            challenge_mode,
            target_amount: None,
            target_count: None,
            current_amount: 0,
            current_count: 0,
            target_date,
            created_from_date,
            status: GoalStatus::Active,
            completed_at: None,
        }
    }

    pub fn with_target_amount(mut self, amount: u64) -> Self {
        self.target_amount = Some(amount);
        self
    }

    pub fn with_target_count(mut self, count: u32) -> Self {
        self.target_count = Some(count);
        self
    }

    pub fn with_progress(mut self, progress: GoalProgress) -> Self {
        self.current_amount = progress.amount;
        self.current_count = progress.count;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    pub fn progress(&self) -> GoalProgress {
        GoalProgress {
            amount: self.current_amount,
            count: self.current_count,
        }
    }

    /// Month the goal is measured over. Once the target date has passed the goal stays
    /// pinned to the month holding that date.
    pub fn evaluation_range(&self, today: NaiveDate) -> DateRange {
        DateRange::month_containing(today.min(self.target_date))
    }

    /// Decides completion for the given actual progress.
    ///
    /// `Both` is an OR of the two sub-conditions and an absent target counts as satisfied,
    /// so a `Both` goal without any target completes on first evaluation.
    pub fn is_met(&self, actual: GoalProgress, today: NaiveDate) -> bool {
        let amount_met = |target: u64| self.threshold_met(actual.amount, target, today);
        let count_met =
            |target: u32| self.threshold_met(u64::from(actual.count), u64::from(target), today);
        match self.challenge_mode {
            ChallengeMode::Amount => self.target_amount.is_some_and(amount_met),
            ChallengeMode::Count => self.target_count.is_some_and(count_met),
            ChallengeMode::Both => {
                self.target_amount.map_or(true, amount_met)
                    || self.target_count.map_or(true, count_met)
            }
        }
    }

    fn threshold_met(&self, actual: u64, target: u64, today: NaiveDate) -> bool {
        match self.goal_type.comparison() {
            Comparison::AtLeast => actual >= target,
            // A cap can only be judged once its period has closed.
            Comparison::AtMost => today > self.target_date && actual <= target,
        }
    }

    /// Overwrites the cached progress fields. Terminal goals keep their final values.
    pub fn record_progress(&mut self, progress: GoalProgress) {
        if self.is_active() {
            self.current_amount = progress.amount;
            self.current_count = progress.count;
        }
    }

    /// Transitions to `Completed`. Returns `false` when the goal was already terminal.
    pub fn complete(&mut self, progress: GoalProgress, at: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.current_amount = progress.amount;
        self.current_count = progress.count;
        self.status = GoalStatus::Completed;
        self.completed_at = Some(at);
        true
    }

    /// Replaces the user-chosen targets without touching progress fields.
    pub fn apply_targets(&mut self, edit: &TargetEdit) {
        self.target_amount = edit.target_amount;
        self.target_count = edit.target_count;
        if let Some(date) = edit.target_date {
            self.target_date = date;
        }
    }
}

/// Goal families. The family alone decides which ledger collection a goal reads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    IncreaseIncome,
    ReduceExpense,
    Habit,
}

impl GoalType {
    /// `IncreaseIncome` reads incomes, every other family reads expenses.
    pub fn source_direction(self) -> Direction {
        match self {
            GoalType::IncreaseIncome => Direction::Income,
            GoalType::ReduceExpense | GoalType::Habit => Direction::Expense,
        }
    }

    pub fn comparison(self) -> Comparison {
        match self {
            GoalType::ReduceExpense => Comparison::AtMost,
            GoalType::IncreaseIncome | GoalType::Habit => Comparison::AtLeast,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            GoalType::IncreaseIncome => "Grow",
            GoalType::ReduceExpense => "Cut",
            GoalType::Habit => "Build",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GoalType::IncreaseIncome => "Increase Income",
            GoalType::ReduceExpense => "Reduce Expense",
            GoalType::Habit => "Habit",
        };
        f.write_str(label)
    }
}

/// How actual progress is compared against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Reach a floor: `actual >= target`.
    AtLeast,
    /// Stay under a cap until the target date has passed: `actual <= target`.
    AtMost,
}

/// Combination policy for amount and count targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeMode {
    Amount,
    Count,
    Both,
}

impl ChallengeMode {
    pub fn from_toggles(amount: bool, count: bool) -> Option<Self> {
        match (amount, count) {
            (true, true) => Some(ChallengeMode::Both),
            (true, false) => Some(ChallengeMode::Amount),
            (false, true) => Some(ChallengeMode::Count),
            (false, false) => None,
        }
    }
}

impl fmt::Display for ChallengeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChallengeMode::Amount => "Amount",
            ChallengeMode::Count => "Count",
            ChallengeMode::Both => "Amount or Count",
        };
        f.write_str(label)
    }
}

/// Goal lifecycle. `Completed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GoalStatus::Active => "Active",
            GoalStatus::Completed => "Completed",
        };
        f.write_str(label)
    }
}

/// Amount and count measured over a goal's period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GoalProgress {
    pub amount: u64,
    pub count: u32,
}

/// Target fields a user may change through reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TargetEdit {
    pub target_amount: Option<u64>,
    pub target_count: Option<u32>,
    pub target_date: Option<NaiveDate>,
}
