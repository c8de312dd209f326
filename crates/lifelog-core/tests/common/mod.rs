#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use lifelog_core::{
    CategoryService, ChallengeService, EventBus, FixedClock, GoalEvaluator, GoalService,
    LedgerService, LedgerStore, MemoryStore, ReconciliationNotifier, StoreError, StoreResult,
    SummaryService,
};
use lifelog_domain::{Category, DateRange, Direction, Goal, LedgerRecord};
use uuid::Uuid;

/// Wraps a [`MemoryStore`] and fails reads or writes on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    fn read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected read failure".into()))
        } else {
            Ok(())
        }
    }

    fn write(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn list_categories(&self, owner_id: Uuid) -> StoreResult<Vec<Category>> {
        self.read()?;
        self.inner.list_categories(owner_id).await
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        self.read()?;
        self.inner.get_category(id).await
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        self.write()?;
        self.inner.insert_category(category).await
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        self.write()?;
        self.inner.update_category(category).await
    }

    async fn list_records(
        &self,
        owner_id: Uuid,
        direction: Direction,
        range: Option<DateRange>,
    ) -> StoreResult<Vec<LedgerRecord>> {
        self.read()?;
        self.inner.list_records(owner_id, direction, range).await
    }

    async fn get_record(
        &self,
        direction: Direction,
        id: Uuid,
    ) -> StoreResult<Option<LedgerRecord>> {
        self.read()?;
        self.inner.get_record(direction, id).await
    }

    async fn insert_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()> {
        self.write()?;
        self.inner.insert_record(direction, record).await
    }

    async fn update_record(&self, direction: Direction, record: &LedgerRecord) -> StoreResult<()> {
        self.write()?;
        self.inner.update_record(direction, record).await
    }

    async fn delete_record(&self, direction: Direction, id: Uuid) -> StoreResult<LedgerRecord> {
        self.write()?;
        self.inner.delete_record(direction, id).await
    }

    async fn list_goals(&self, owner_id: Uuid) -> StoreResult<Vec<Goal>> {
        self.read()?;
        self.inner.list_goals(owner_id).await
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<Goal>> {
        self.read()?;
        self.inner.get_goal(id).await
    }

    async fn insert_goal(&self, goal: &Goal) -> StoreResult<()> {
        self.write()?;
        self.inner.insert_goal(goal).await
    }

    async fn update_goal(&self, goal: &Goal) -> StoreResult<()> {
        self.write()?;
        self.inner.update_goal(goal).await
    }
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
}

/// Every service wired to one flaky store, with "today" fixed at 2024-06-15.
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub owner: Uuid,
    pub bus: EventBus,
    pub categories: CategoryService,
    pub ledger: LedgerService,
    pub summaries: SummaryService,
    pub goals: GoalService,
    pub evaluator: GoalEvaluator,
    pub challenges: ChallengeService,
    pub notifier: ReconciliationNotifier,
}

pub fn harness() -> Harness {
    let store = Arc::new(FlakyStore::default());
    let shared: Arc<dyn LedgerStore> = store.clone();
    let bus = EventBus::default();
    let clock = Arc::new(FixedClock::on(date(6, 15)));
    let ledger = LedgerService::new(shared.clone(), bus.clone());
    let goals = GoalService::new(shared.clone());
    let evaluator = GoalEvaluator::new(shared.clone(), bus.clone(), clock.clone());
    Harness {
        owner: Uuid::new_v4(),
        categories: CategoryService::new(shared.clone()),
        summaries: SummaryService::new(ledger.clone()),
        challenges: ChallengeService::new(shared.clone(), goals.clone(), clock),
        notifier: ReconciliationNotifier::new(evaluator.clone(), goals.clone(), bus.clone()),
        ledger,
        goals,
        evaluator,
        bus,
        store,
    }
}
