//! Recomputes goal progress from the live ledger and drives the completion transition.

use std::{collections::HashMap, sync::Arc};

use futures_util::future::join_all;
use uuid::Uuid;

use lifelog_domain::{
    normalize_name, Category, DateRange, Direction, Goal, GoalProgress, LedgerRecord,
};

use crate::{
    cancel::CancelSignal, events::EventBus, storage::LedgerStore, time::Clock, CoreError,
    CoreResult,
};

/// Outcome of evaluating one goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub goal_id: Uuid,
    pub current_amount: u64,
    pub current_count: u32,
    pub is_completed: bool,
    /// True only for the evaluation that performed the `Active -> Completed` transition.
    pub newly_completed: bool,
}

impl Evaluation {
    fn of(goal: &Goal, newly_completed: bool) -> Self {
        Self {
            goal_id: goal.id,
            current_amount: goal.current_amount,
            current_count: goal.current_count,
            is_completed: !goal.is_active(),
            newly_completed,
        }
    }
}

/// All-settled result of a batch: successes and per-goal failures side by side.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub evaluations: Vec<Evaluation>,
    pub failures: Vec<(Uuid, CoreError)>,
}

impl BatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| e.newly_completed)
    }
}

#[derive(Clone)]
pub struct GoalEvaluator {
    store: Arc<dyn LedgerStore>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl GoalEvaluator {
    pub fn new(store: Arc<dyn LedgerStore>, bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self { store, bus, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Evaluates one goal against the current calendar month, or against its target month once
    /// the target date has passed.
    ///
    /// Completed goals are returned unchanged without touching storage.
    pub async fn evaluate(&self, goal_id: Uuid, cancel: &CancelSignal) -> CoreResult<Evaluation> {
        let mut goal = self
            .store
            .get_goal(goal_id)
            .await
            .map_err(CoreError::read("load goal"))?
            .ok_or(CoreError::GoalNotFound(goal_id))?;
        if !goal.is_active() {
            return Ok(Evaluation::of(&goal, false));
        }

        let today = self.clock.today();
        let progress = self
            .measure(&goal, goal.evaluation_range(today))
            .await?;

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let newly_completed = goal.is_met(progress, today) && goal.complete(progress, self.clock.now());
        if !newly_completed {
            goal.record_progress(progress);
        }
        self.store
            .update_goal(&goal)
            .await
            .map_err(CoreError::write("save goal progress"))?;

        if newly_completed {
            tracing::info!(goal_id = %goal.id, title = %goal.title, "goal completed");
            self.bus.announce_completion(goal.id, &goal.title);
        } else {
            tracing::debug!(
                goal_id = %goal.id,
                amount = progress.amount,
                count = progress.count,
                "goal progress refreshed"
            );
        }
        Ok(Evaluation::of(&goal, newly_completed))
    }

    /// Sums the goal's category in its source collection over `range`.
    async fn measure(&self, goal: &Goal, range: DateRange) -> CoreResult<GoalProgress> {
        let direction = goal.goal_type.source_direction();
        let (records, categories) = tokio::try_join!(
            async {
                self.store
                    .list_records(goal.owner_id, direction, Some(range))
                    .await
                    .map_err(CoreError::read("load goal source"))
            },
            async {
                self.store
                    .list_categories(goal.owner_id)
                    .await
                    .map_err(CoreError::read("load categories"))
            },
        )?;

        Ok(tally(&records, &categories, &goal.category_name))
    }

    /// Evaluates every id concurrently. One failure never aborts the others.
    pub async fn evaluate_many(&self, goal_ids: &[Uuid], cancel: &CancelSignal) -> BatchReport {
        let results = join_all(goal_ids.iter().map(|&id| async move {
            (id, self.evaluate(id, cancel).await)
        }))
        .await;

        let mut report = BatchReport::default();
        for (id, result) in results {
            match result {
                Ok(evaluation) => report.evaluations.push(evaluation),
                Err(err) => {
                    tracing::warn!(goal_id = %id, error = %err, "goal evaluation failed");
                    report.failures.push((id, err));
                }
            }
        }
        report
    }

    /// Re-evaluates every active goal whose source collection is `direction`.
    pub async fn evaluate_bucket(
        &self,
        owner_id: Uuid,
        direction: Direction,
        cancel: &CancelSignal,
    ) -> CoreResult<BatchReport> {
        let ids: Vec<Uuid> = self
            .store
            .list_goals(owner_id)
            .await
            .map_err(CoreError::read("load goals"))?
            .into_iter()
            .filter(|g| g.is_active() && g.goal_type.source_direction() == direction)
            .map(|g| g.id)
            .collect();
        Ok(self.evaluate_many(&ids, cancel).await)
    }
}

/// Amount and row count of the records filed under `category_name` (case-insensitive).
pub(crate) fn tally(
    records: &[LedgerRecord],
    categories: &[Category],
    category_name: &str,
) -> GoalProgress {
    let wanted = normalize_name(category_name);
    let names: HashMap<Uuid, String> = categories
        .iter()
        .map(|c| (c.id, c.normalized_name()))
        .collect();

    records
        .iter()
        .filter(|r| names.get(&r.category_id) == Some(&wanted))
        .fold(GoalProgress::default(), |mut progress, record| {
            progress.amount += record.amount;
            progress.count = progress.count.saturating_add(1);
            progress
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cancel::cancel_pair, memory_store::MemoryStore, time::FixedClock};
    use chrono::NaiveDate;
    use lifelog_domain::{
        Category, CategoryKind, ChallengeMode, GoalStatus, GoalType, Transaction,
    };

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        owner: Uuid,
        coffee: Category,
        bus: EventBus,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let owner = Uuid::new_v4();
            let coffee = Category::new(owner, "Coffee", CategoryKind::ExpenseVariable);
            store.insert_category(&coffee).await.unwrap();
            Self {
                store,
                owner,
                coffee,
                bus: EventBus::default(),
            }
        }

        async fn spend(&self, amount: u64, on: NaiveDate) {
            let txn = Transaction::new(
                self.owner,
                self.coffee.id,
                "Latte",
                amount,
                on,
                Direction::Expense,
            );
            let (direction, record) = txn.into_record(chrono::Utc::now());
            self.store.insert_record(direction, &record).await.unwrap();
        }

        async fn goal(&self, goal: Goal) -> Uuid {
            self.store.insert_goal(&goal).await.unwrap();
            goal.id
        }

        fn evaluator(&self, today: NaiveDate) -> GoalEvaluator {
            GoalEvaluator::new(
                self.store.clone(),
                self.bus.clone(),
                Arc::new(FixedClock::on(today)),
            )
        }
    }

    #[tokio::test]
    async fn habit_goal_counts_this_months_category_rows() {
        let fx = Fixture::new().await;
        fx.spend(500, date(6, 2)).await;
        fx.spend(700, date(6, 9)).await;
        fx.spend(900, date(5, 30)).await;
        let id = fx
            .goal(
                Goal::new(fx.owner, "coffee", GoalType::Habit, ChallengeMode::Count, date(6, 1), date(6, 30))
                    .with_target_count(3),
            )
            .await;

        let evaluation = fx
            .evaluator(date(6, 15))
            .evaluate(id, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(evaluation.current_amount, 1_200);
        assert_eq!(evaluation.current_count, 2);
        assert!(!evaluation.is_completed);
        assert_eq!(fx.store.get_goal(id).await.unwrap().unwrap().current_count, 2);
    }

    #[tokio::test]
    async fn reduce_goal_over_cap_stays_active() {
        let fx = Fixture::new().await;
        fx.spend(5_000, date(6, 3)).await;
        fx.spend(3_000, date(6, 4)).await;
        let id = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::ReduceExpense, ChallengeMode::Amount, date(6, 1), date(6, 10))
                    .with_target_amount(4_000),
            )
            .await;

        let evaluation = fx
            .evaluator(date(6, 20))
            .evaluate(id, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(evaluation.current_amount, 8_000);
        assert!(!evaluation.is_completed);
    }

    #[tokio::test]
    async fn reduce_goal_is_judged_on_its_own_month_after_target_date() {
        let fx = Fixture::new().await;
        fx.spend(5_000, date(6, 3)).await;
        fx.spend(3_000, date(6, 4)).await;
        let over = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::ReduceExpense, ChallengeMode::Amount, date(6, 1), date(6, 30))
                    .with_target_amount(4_000),
            )
            .await;
        let under = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::ReduceExpense, ChallengeMode::Amount, date(6, 1), date(6, 30))
                    .with_target_amount(10_000),
            )
            .await;
        let evaluator = fx.evaluator(date(7, 1));

        let over = evaluator.evaluate(over, &CancelSignal::never()).await.unwrap();
        assert_eq!(over.current_amount, 8_000);
        assert!(!over.is_completed);

        let under = evaluator.evaluate(under, &CancelSignal::never()).await.unwrap();
        assert_eq!(under.current_amount, 8_000);
        assert!(under.newly_completed);
    }

    #[tokio::test]
    async fn completion_is_monotonic_and_announced_once() {
        let fx = Fixture::new().await;
        let mut rx = fx.bus.subscribe();
        fx.spend(500, date(6, 2)).await;
        let id = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::Habit, ChallengeMode::Count, date(6, 1), date(6, 30))
                    .with_target_count(1),
            )
            .await;
        let evaluator = fx.evaluator(date(6, 15));

        let first = evaluator.evaluate(id, &CancelSignal::never()).await.unwrap();
        assert!(first.newly_completed);

        let rows = fx.store.list_records(fx.owner, Direction::Expense, None).await.unwrap();
        fx.store.delete_record(Direction::Expense, rows[0].id).await.unwrap();

        let second = evaluator.evaluate(id, &CancelSignal::never()).await.unwrap();
        assert!(second.is_completed);
        assert!(!second.newly_completed);
        assert_eq!(second.current_count, 1);

        let stored = fx.store.get_goal(id).await.unwrap().unwrap();
        assert_eq!(stored.status, GoalStatus::Completed);
        assert!(matches!(rx.try_recv(), Ok(crate::events::LedgerEvent::GoalCompleted { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn both_without_targets_completes_on_first_run() {
        let fx = Fixture::new().await;
        let id = fx
            .goal(Goal::new(
                fx.owner,
                "Salary",
                GoalType::IncreaseIncome,
                ChallengeMode::Both,
                date(6, 1),
                date(6, 30),
            ))
            .await;
        let evaluation = fx
            .evaluator(date(6, 15))
            .evaluate(id, &CancelSignal::never())
            .await
            .unwrap();
        assert!(evaluation.newly_completed);
    }

    #[tokio::test]
    async fn batch_isolates_missing_goals() {
        let fx = Fixture::new().await;
        let id = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::Habit, ChallengeMode::Count, date(6, 1), date(6, 30))
                    .with_target_count(5),
            )
            .await;
        let missing = Uuid::new_v4();
        let report = fx
            .evaluator(date(6, 15))
            .evaluate_many(&[missing, id], &CancelSignal::never())
            .await;
        assert_eq!(report.evaluations.len(), 1);
        assert_eq!(report.evaluations[0].goal_id, id);
        assert!(matches!(report.failures.as_slice(), [(failed, CoreError::GoalNotFound(_))] if *failed == missing));
    }

    #[tokio::test]
    async fn cancelled_evaluation_writes_nothing() {
        let fx = Fixture::new().await;
        fx.spend(500, date(6, 2)).await;
        let id = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::Habit, ChallengeMode::Count, date(6, 1), date(6, 30))
                    .with_target_count(9),
            )
            .await;
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let err = fx
            .evaluator(date(6, 15))
            .evaluate(id, &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(fx.store.get_goal(id).await.unwrap().unwrap().current_count, 0);
    }

    #[tokio::test]
    async fn bucket_only_touches_matching_source() {
        let fx = Fixture::new().await;
        fx.spend(500, date(6, 2)).await;
        let habit = fx
            .goal(
                Goal::new(fx.owner, "Coffee", GoalType::Habit, ChallengeMode::Count, date(6, 1), date(6, 30))
                    .with_target_count(9),
            )
            .await;
        let income = fx
            .goal(
                Goal::new(fx.owner, "Salary", GoalType::IncreaseIncome, ChallengeMode::Amount, date(6, 1), date(6, 30))
                    .with_target_amount(1),
            )
            .await;
        let report = fx
            .evaluator(date(6, 15))
            .evaluate_bucket(fx.owner, Direction::Expense, &CancelSignal::never())
            .await
            .unwrap();
        let ids: Vec<Uuid> = report.evaluations.iter().map(|e| e.goal_id).collect();
        assert_eq!(ids, vec![habit]);
        assert!(!ids.contains(&income));
    }
}
