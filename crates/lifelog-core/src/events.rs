//! Session-scoped publish/subscribe channel between the mutation layer and UI consumers.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use lifelog_domain::{Direction, Goal, GoalType};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// A transaction in `category_name` was created, edited, or deleted.
    LedgerMutated {
        owner_id: Uuid,
        category_name: String,
        direction: Direction,
    },
    /// Emitted once per goal id for the lifetime of the bus.
    GoalCompleted { goal_id: Uuid, title: String },
    ReconciliationNeeded(ReconciliationNotice),
    ReconciliationClosed { category_name: String },
}

/// Goals whose targets may need re-tuning after a change in `category_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationNotice {
    pub owner_id: Uuid,
    pub category_name: String,
    pub direction: Direction,
    pub goals: Vec<AffectedGoal>,
}

/// Current-vs-target snapshot of one affected goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedGoal {
    pub goal_id: Uuid,
    pub title: String,
    pub goal_type: GoalType,
    pub current_amount: u64,
    pub current_count: u32,
    pub target_amount: Option<u64>,
    pub target_count: Option<u32>,
    pub target_date: NaiveDate,
}

impl From<&Goal> for AffectedGoal {
    fn from(goal: &Goal) -> Self {
        Self {
            goal_id: goal.id,
            title: goal.title.clone(),
            goal_type: goal.goal_type,
            current_amount: goal.current_amount,
            current_count: goal.current_count,
            target_amount: goal.target_amount,
            target_count: goal.target_count,
            target_date: goal.target_date,
        }
    }
}

/// A view that is either being refreshed or holds the refreshed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Refresh<T> {
    #[default]
    Pending,
    Ready(T),
}

impl<T> Refresh<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Refresh::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Refresh::Ready(value) => Some(value),
            Refresh::Pending => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Refresh::Ready(value) => Some(value),
            Refresh::Pending => None,
        }
    }
}

#[derive(Debug)]
struct BusInner {
    sender: broadcast::Sender<LedgerEvent>,
    announced: Mutex<HashSet<Uuid>>,
}

/// Cloneable handle; every clone publishes to the same subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                sender,
                announced: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.sender.subscribe()
    }

    /// Returns the number of subscribers reached.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        match self.inner.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("event published with no subscribers");
                0
            }
        }
    }

    /// Publishes `GoalCompleted` unless this goal was already announced.
    pub fn announce_completion(&self, goal_id: Uuid, title: &str) -> bool {
        let first = match self.inner.announced.lock() {
            Ok(mut announced) => announced.insert(goal_id),
            Err(poisoned) => poisoned.into_inner().insert(goal_id),
        };
        if first {
            self.publish(LedgerEvent::GoalCompleted {
                goal_id,
                title: title.to_string(),
            });
        }
        first
    }
}
