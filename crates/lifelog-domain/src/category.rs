//! Domain types representing ledger categories.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Classifies ledger activity by direction and fixedness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub state: CategoryState,
}

impl Category {
    pub fn new(owner_id: Uuid, name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            kind,
            state: CategoryState::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state == CategoryState::Deleted
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    /// Moves the category into the deleted state.
    pub fn delete(&mut self) -> Result<(), CategoryTransitionError> {
        self.state = self.state.delete()?;
        Ok(())
    }

    /// Brings a deleted category back into the active set.
    pub fn restore(&mut self) -> Result<(), CategoryTransitionError> {
        self.state = self.state.restore()?;
        Ok(())
    }

    /// Case-insensitive, whitespace-trimmed name used for uniqueness checks.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The four-way classification: direction x fixedness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    IncomeFixed,
    IncomeVariable,
    ExpenseFixed,
    ExpenseVariable,
}

impl CategoryKind {
    pub fn new(direction: Direction, fixed: bool) -> Self {
        match (direction, fixed) {
            (Direction::Income, true) => CategoryKind::IncomeFixed,
            (Direction::Income, false) => CategoryKind::IncomeVariable,
            (Direction::Expense, true) => CategoryKind::ExpenseFixed,
            (Direction::Expense, false) => CategoryKind::ExpenseVariable,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            CategoryKind::IncomeFixed | CategoryKind::IncomeVariable => Direction::Income,
            CategoryKind::ExpenseFixed | CategoryKind::ExpenseVariable => Direction::Expense,
        }
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, CategoryKind::IncomeFixed | CategoryKind::ExpenseFixed)
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CategoryKind::IncomeFixed => "Fixed Income",
            CategoryKind::IncomeVariable => "Variable Income",
            CategoryKind::ExpenseFixed => "Fixed Expense",
            CategoryKind::ExpenseVariable => "Variable Expense",
        };
        f.write_str(label)
    }
}

/// Soft-delete lifecycle of a category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    #[default]
    Active,
    Deleted,
}

impl CategoryState {
    pub fn delete(self) -> Result<Self, CategoryTransitionError> {
        match self {
            CategoryState::Active => Ok(CategoryState::Deleted),
            CategoryState::Deleted => Err(CategoryTransitionError::AlreadyDeleted),
        }
    }

    pub fn restore(self) -> Result<Self, CategoryTransitionError> {
        match self {
            CategoryState::Deleted => Ok(CategoryState::Active),
            CategoryState::Active => Err(CategoryTransitionError::NotDeleted),
        }
    }
}

impl fmt::Display for CategoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CategoryState::Active => "Active",
            CategoryState::Deleted => "Deleted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryTransitionError {
    AlreadyDeleted,
    NotDeleted,
}

impl fmt::Display for CategoryTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryTransitionError::AlreadyDeleted => f.write_str("category is already deleted"),
            CategoryTransitionError::NotDeleted => f.write_str("category is not deleted"),
        }
    }
}

impl std::error::Error for CategoryTransitionError {}
