//! lifelog-core
//!
//! Ledger aggregation, goal evaluation, and reconciliation services.
//! Depends on lifelog-domain. Storage is reached only through [`LedgerStore`].

pub mod cancel;
pub mod category_service;
pub mod challenge_service;
pub mod error;
pub mod events;
pub mod goal_evaluator;
pub mod goal_service;
pub mod ledger_service;
pub mod memory_store;
pub mod reconciliation_service;
pub mod storage;
pub mod summary_service;
pub mod time;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use category_service::*;
pub use challenge_service::{
    CategoryBaseline, ChallengeDraft, ChallengeService, ChallengeTargets,
};
pub use error::{CoreError, CoreResult, StoreError, StoreResult};
pub use events::*;
pub use goal_evaluator::{BatchReport, Evaluation, GoalEvaluator};
pub use goal_service::GoalService;
pub use ledger_service::*;
pub use memory_store::MemoryStore;
pub use reconciliation_service::{ReconciliationNotifier, Step};
pub use storage::{LedgerStore, StoreTables};
pub use summary_service::*;
pub use time::{Clock, FixedClock, SystemClock};
