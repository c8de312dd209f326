//! One owner's ledger, wired to a store, an event bus, and every service.

use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle};
use uuid::Uuid;

use lifelog_config::{Config, ScopeSetting};
use lifelog_core::{
    cancel_pair, CancelHandle, CancelSignal, CategoryService, ChallengeService, Clock, EventBus,
    GoalEvaluator, GoalService, LedgerEvent, LedgerService, LedgerStore, MemoryStore,
    ReconciliationNotifier, SummaryReport, SummaryService, SystemClock,
};
use lifelog_domain::DateScope;
use lifelog_storage_json::JsonStore;

use crate::errors::LifelogError;

pub const STORE_FILE: &str = "ledger.json";

pub struct Session {
    owner_id: Uuid,
    default_scope: ScopeSetting,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    categories: CategoryService,
    ledger: LedgerService,
    summaries: SummaryService,
    goals: GoalService,
    evaluator: GoalEvaluator,
    challenges: ChallengeService,
    notifier: Arc<ReconciliationNotifier>,
}

impl Session {
    pub fn new(owner_id: Uuid, store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        let bus = EventBus::default();
        let ledger = LedgerService::new(store.clone(), bus.clone());
        let goals = GoalService::new(store.clone());
        let evaluator = GoalEvaluator::new(store.clone(), bus.clone(), clock.clone());
        Self {
            owner_id,
            default_scope: ScopeSetting::default(),
            categories: CategoryService::new(store.clone()),
            summaries: SummaryService::new(ledger.clone()),
            challenges: ChallengeService::new(store, goals.clone(), clock.clone()),
            notifier: Arc::new(ReconciliationNotifier::new(
                evaluator.clone(),
                goals.clone(),
                bus.clone(),
            )),
            clock,
            bus,
            ledger,
            goals,
            evaluator,
        }
    }

    pub fn in_memory(owner_id: Uuid) -> Self {
        Self::new(owner_id, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Opens the JSON store under the configured data directory.
    pub fn from_config(config: &Config) -> Result<Self, LifelogError> {
        let owner_id = config.owner_id.ok_or(LifelogError::MissingOwner)?;
        let path = config.resolve_data_dir().join(STORE_FILE);
        let store = JsonStore::open(path)?;
        tracing::info!(owner_id = %owner_id, path = %store.path().display(), "session opened");
        Ok(Self::new(owner_id, Arc::new(store), Arc::new(SystemClock))
            .with_default_scope(config.default_scope))
    }

    pub fn with_default_scope(mut self, scope: ScopeSetting) -> Self {
        self.default_scope = scope;
        self
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    /// The configured scope resolved against today's date.
    pub fn default_scope(&self) -> DateScope {
        let today = self.clock.today();
        match self.default_scope {
            ScopeSetting::Unscoped => DateScope::Unscoped,
            ScopeSetting::Month => DateScope::month_of(today),
            ScopeSetting::Day => DateScope::Day { date: today },
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.bus.subscribe()
    }

    pub fn categories(&self) -> &CategoryService {
        &self.categories
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn summaries(&self) -> &SummaryService {
        &self.summaries
    }

    pub fn goals(&self) -> &GoalService {
        &self.goals
    }

    pub fn evaluator(&self) -> &GoalEvaluator {
        &self.evaluator
    }

    pub fn challenges(&self) -> &ChallengeService {
        &self.challenges
    }

    pub fn notifier(&self) -> &Arc<ReconciliationNotifier> {
        &self.notifier
    }

    /// Summary for the default scope; never fails, see [`SummaryReport`].
    pub async fn summary(&self, cancel: &CancelSignal) -> SummaryReport {
        self.summaries
            .report(self.owner_id, self.default_scope(), cancel)
            .await
    }

    /// Starts the reconciliation driver on the current tokio runtime.
    pub fn spawn_notifier(&self) -> NotifierTask {
        let (cancel, signal) = cancel_pair();
        let events = self.bus.subscribe();
        let handle = tokio::spawn(self.notifier.clone().run(events, signal));
        NotifierTask { cancel, handle }
    }
}

/// Running reconciliation driver.
pub struct NotifierTask {
    cancel: CancelHandle,
    handle: JoinHandle<()>,
}

impl NotifierTask {
    /// Stops the driver and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            tracing::warn!(error = %err, "reconciliation driver ended abnormally");
        }
    }
}
