//! Reconciliation of goal targets after the ledger they track has changed.
//!
//! Each mutation re-evaluates the affected goal bucket first, publishes the refreshed goal view,
//! and only then surfaces a notice. Affected goals are presented one at a time; the notice closes
//! once every goal has been submitted or skipped, or when it is dismissed.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use lifelog_domain::{normalize_name, Direction, Goal, TargetEdit};

use crate::{
    cancel::CancelSignal,
    events::{AffectedGoal, EventBus, LedgerEvent, ReconciliationNotice, Refresh},
    goal_evaluator::GoalEvaluator,
    goal_service::GoalService,
    CoreError, CoreResult,
};

/// Where a reconciliation sequence stands after a submit or skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Next(AffectedGoal),
    Finished,
}

#[derive(Debug)]
struct PendingReconciliation {
    notice: ReconciliationNotice,
    cursor: usize,
}

impl PendingReconciliation {
    fn current(&self) -> Option<&AffectedGoal> {
        self.notice.goals.get(self.cursor)
    }

    /// Refreshes snapshots from a re-evaluation. Goals no longer active drop out, goals new to
    /// the category join at the end, and the cursor keeps pointing at the same unhandled goal.
    fn merge(&mut self, affected: Vec<AffectedGoal>) {
        let handled = self.cursor.min(self.notice.goals.len());
        let mut kept_before_cursor = 0;
        let mut goals = Vec::with_capacity(affected.len());
        for (index, goal) in self.notice.goals.iter().enumerate() {
            if let Some(fresh) = affected.iter().find(|a| a.goal_id == goal.goal_id) {
                if index < handled {
                    kept_before_cursor += 1;
                }
                goals.push(fresh.clone());
            }
        }
        for fresh in affected {
            if !self.notice.goals.iter().any(|g| g.goal_id == fresh.goal_id) {
                goals.push(fresh);
            }
        }
        self.notice.goals = goals;
        self.cursor = kept_before_cursor;
    }
}

pub struct ReconciliationNotifier {
    evaluator: GoalEvaluator,
    goals: GoalService,
    bus: EventBus,
    pending: Mutex<HashMap<String, PendingReconciliation>>,
    view: watch::Sender<Refresh<Vec<Goal>>>,
}

impl ReconciliationNotifier {
    pub fn new(evaluator: GoalEvaluator, goals: GoalService, bus: EventBus) -> Self {
        let (view, _) = watch::channel(Refresh::Pending);
        Self {
            evaluator,
            goals,
            bus,
            pending: Mutex::new(HashMap::new()),
            view,
        }
    }

    /// Active goals as of the last completed refresh. `Pending` while a refresh is in flight.
    pub fn goals_view(&self) -> watch::Receiver<Refresh<Vec<Goal>>> {
        self.view.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingReconciliation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles one ledger mutation. Returns the notice when a new one was surfaced.
    ///
    /// The goal view never stays `Pending` past this call: on failure it is re-read, or the
    /// last known state is put back.
    pub async fn on_ledger_mutated(
        &self,
        owner_id: Uuid,
        category_name: &str,
        direction: Direction,
        cancel: &CancelSignal,
    ) -> CoreResult<Option<ReconciliationNotice>> {
        let previous = self.view.send_replace(Refresh::Pending);
        match self
            .reconcile(owner_id, category_name, direction, cancel)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let restored = match self.goals.list_active(owner_id).await {
                    Ok(active) => Refresh::Ready(active),
                    Err(_) => match previous {
                        Refresh::Ready(goals) => Refresh::Ready(goals),
                        Refresh::Pending => Refresh::Ready(Vec::new()),
                    },
                };
                self.view.send_replace(restored);
                Err(err)
            }
        }
    }

    async fn reconcile(
        &self,
        owner_id: Uuid,
        category_name: &str,
        direction: Direction,
        cancel: &CancelSignal,
    ) -> CoreResult<Option<ReconciliationNotice>> {
        let batch = self
            .evaluator
            .evaluate_bucket(owner_id, direction, cancel)
            .await?;
        if !batch.failures.is_empty() {
            tracing::warn!(
                category = %category_name,
                failed = batch.failures.len(),
                "some goals could not be re-evaluated"
            );
        }
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // Any active goal declared on the category, whatever collection it reads.
        let active = self.goals.list_active(owner_id).await?;
        let wanted = normalize_name(category_name);
        let affected: Vec<AffectedGoal> = active
            .iter()
            .filter(|goal| normalize_name(&goal.category_name) == wanted)
            .map(AffectedGoal::from)
            .collect();
        self.view.send_replace(Refresh::Ready(active));

        let mut pending = self.lock();
        if let Some(existing) = pending.get_mut(&wanted) {
            existing.merge(affected);
            if existing.current().is_some() {
                tracing::debug!(category = %category_name, "reconciliation already pending");
                return Ok(None);
            }
            let finished = pending.remove(&wanted);
            drop(pending);
            if let Some(p) = finished {
                self.closed(p.notice.category_name);
            }
            return Ok(None);
        }
        if affected.is_empty() {
            return Ok(None);
        }

        let notice = ReconciliationNotice {
            owner_id,
            category_name: category_name.to_string(),
            direction,
            goals: affected,
        };
        pending.insert(
            wanted,
            PendingReconciliation {
                notice: notice.clone(),
                cursor: 0,
            },
        );
        drop(pending);

        tracing::info!(
            category = %category_name,
            goals = notice.goals.len(),
            "goal reconciliation needed"
        );
        self.bus
            .publish(LedgerEvent::ReconciliationNeeded(notice.clone()));
        Ok(Some(notice))
    }

    pub fn pending(&self, category_name: &str) -> Option<ReconciliationNotice> {
        self.lock()
            .get(&normalize_name(category_name))
            .map(|p| p.notice.clone())
    }

    pub fn pending_categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .values()
            .map(|p| p.notice.category_name.clone())
            .collect();
        names.sort();
        names
    }

    /// The goal currently presented for editing.
    pub fn current(&self, category_name: &str) -> Option<AffectedGoal> {
        self.lock()
            .get(&normalize_name(category_name))
            .and_then(|p| p.current().cloned())
    }

    /// Saves new targets for the current goal and moves to the next one.
    pub async fn submit(&self, category_name: &str, edit: TargetEdit) -> CoreResult<Step> {
        let goal = self
            .current(category_name)
            .ok_or_else(|| CoreError::NoPendingReconciliation(category_name.to_string()))?;
        self.goals.update_targets(goal.goal_id, edit).await?;
        self.advance(category_name, goal.goal_id)
    }

    /// Moves past the current goal without touching its targets.
    pub fn skip(&self, category_name: &str) -> CoreResult<Step> {
        let goal = self
            .current(category_name)
            .ok_or_else(|| CoreError::NoPendingReconciliation(category_name.to_string()))?;
        self.advance(category_name, goal.goal_id)
    }

    /// Closes the notice. Returns `false` if nothing was pending.
    pub fn dismiss(&self, category_name: &str) -> bool {
        let removed = self.lock().remove(&normalize_name(category_name));
        match removed {
            Some(p) => {
                self.closed(p.notice.category_name);
                true
            }
            None => false,
        }
    }

    fn advance(&self, category_name: &str, from: Uuid) -> CoreResult<Step> {
        let key = normalize_name(category_name);
        let mut pending = self.lock();
        let entry = pending
            .get_mut(&key)
            .ok_or_else(|| CoreError::NoPendingReconciliation(category_name.to_string()))?;
        // A concurrent submit may already have moved the cursor.
        if entry.current().map(|g| g.goal_id) == Some(from) {
            entry.cursor += 1;
        }
        if let Some(next) = entry.current() {
            return Ok(Step::Next(next.clone()));
        }
        let finished = pending.remove(&key);
        drop(pending);
        if let Some(p) = finished {
            self.closed(p.notice.category_name);
        }
        Ok(Step::Finished)
    }

    fn closed(&self, category_name: String) {
        tracing::debug!(category = %category_name, "reconciliation closed");
        self.bus
            .publish(LedgerEvent::ReconciliationClosed { category_name });
    }

    /// Consumes ledger mutations until the bus closes or `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<LedgerEvent>,
        cancel: CancelSignal,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(LedgerEvent::LedgerMutated {
                    owner_id,
                    category_name,
                    direction,
                }) => {
                    if let Err(err) = self
                        .on_ledger_mutated(owner_id, &category_name, direction, &cancel)
                        .await
                    {
                        tracing::warn!(category = %category_name, error = %err, "reconciliation check failed");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "reconciliation driver lagged behind the event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("reconciliation driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory_store::MemoryStore, storage::LedgerStore, time::FixedClock};
    use chrono::{NaiveDate, Utc};
    use lifelog_domain::{Category, CategoryKind, ChallengeMode, GoalType, Transaction};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        owner: Uuid,
        bus: EventBus,
        notifier: ReconciliationNotifier,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let bus = EventBus::default();
        let coffee = Category::new(owner, "Coffee", CategoryKind::ExpenseVariable);
        store.insert_category(&coffee).await.unwrap();
        let txn = Transaction::new(owner, coffee.id, "Latte", 900, date(3), Direction::Expense);
        let (direction, record) = txn.into_record(Utc::now());
        store.insert_record(direction, &record).await.unwrap();

        let evaluator = GoalEvaluator::new(store.clone(), bus.clone(), Arc::new(FixedClock::on(date(15))));
        let goals = GoalService::new(store.clone());
        let notifier = ReconciliationNotifier::new(evaluator, goals, bus.clone());
        Fixture {
            store,
            owner,
            bus,
            notifier,
        }
    }

    async fn coffee_goal(fx: &Fixture, cap: u64) -> Goal {
        let goal = Goal::new(
            fx.owner,
            "Coffee",
            GoalType::ReduceExpense,
            ChallengeMode::Amount,
            date(1),
            date(30),
        )
        .with_target_amount(cap);
        fx.store.insert_goal(&goal).await.unwrap();
        goal
    }

    #[tokio::test]
    async fn notice_carries_refreshed_progress_and_is_deduplicated() {
        let fx = fixture().await;
        let goal = coffee_goal(&fx, 500).await;
        let mut rx = fx.bus.subscribe();
        let never = CancelSignal::never();

        let notice = fx
            .notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap()
            .expect("notice");
        assert_eq!(notice.goals.len(), 1);
        assert_eq!(notice.goals[0].goal_id, goal.id);
        assert_eq!(notice.goals[0].current_amount, 900);
        assert!(fx.notifier.goals_view().borrow().is_ready());

        let again = fx
            .notifier
            .on_ledger_mutated(fx.owner, "coffee", Direction::Expense, &never)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(fx.notifier.pending_categories(), vec!["Coffee".to_string()]);

        assert!(matches!(rx.try_recv(), Ok(LedgerEvent::ReconciliationNeeded(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unrelated_category_surfaces_nothing() {
        let fx = fixture().await;
        coffee_goal(&fx, 500).await;
        let outcome = fx
            .notifier
            .on_ledger_mutated(fx.owner, "Food", Direction::Expense, &CancelSignal::never())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(fx.notifier.pending("Food").is_none());
    }

    #[tokio::test]
    async fn goals_are_presented_one_at_a_time() {
        let fx = fixture().await;
        let first = coffee_goal(&fx, 500).await;
        let second = coffee_goal(&fx, 700).await;
        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(fx.notifier.current("Coffee").unwrap().goal_id, first.id);
        let step = fx
            .notifier
            .submit(
                "Coffee",
                TargetEdit {
                    target_amount: Some(800),
                    ..TargetEdit::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(step, Step::Next(ref g) if g.goal_id == second.id));

        assert_eq!(fx.notifier.skip("Coffee").unwrap(), Step::Finished);
        assert!(fx.notifier.pending("Coffee").is_none());

        let edited = fx.store.get_goal(first.id).await.unwrap().unwrap();
        assert_eq!(edited.target_amount, Some(800));
        assert_eq!(edited.current_amount, 900);
        let skipped = fx.store.get_goal(second.id).await.unwrap().unwrap();
        assert_eq!(skipped.target_amount, Some(700));
        assert_eq!(skipped.current_amount, 900);
    }

    #[tokio::test]
    async fn dismiss_closes_the_notice() {
        let fx = fixture().await;
        coffee_goal(&fx, 500).await;
        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &CancelSignal::never())
            .await
            .unwrap();
        let mut rx = fx.bus.subscribe();
        assert!(fx.notifier.dismiss("COFFEE"));
        assert!(!fx.notifier.dismiss("Coffee"));
        assert!(matches!(
            rx.try_recv(),
            Ok(LedgerEvent::ReconciliationClosed { category_name }) if category_name == "Coffee"
        ));
        assert!(matches!(
            fx.notifier.skip("Coffee"),
            Err(CoreError::NoPendingReconciliation(_))
        ));
    }

    async fn add_latte(fx: &Fixture, category: &Category) {
        let txn = Transaction::new(fx.owner, category.id, "Latte", 300, date(5), Direction::Expense);
        let (direction, record) = txn.into_record(Utc::now());
        fx.store.insert_record(direction, &record).await.unwrap();
    }

    #[tokio::test]
    async fn goals_on_the_category_surface_whatever_they_read() {
        let fx = fixture().await;
        let salary = Category::new(fx.owner, "Salary", CategoryKind::IncomeFixed);
        fx.store.insert_category(&salary).await.unwrap();
        let habit = Goal::new(fx.owner, "Salary", GoalType::Habit, ChallengeMode::Count, date(1), date(30))
            .with_target_count(4);
        fx.store.insert_goal(&habit).await.unwrap();

        let notice = fx
            .notifier
            .on_ledger_mutated(fx.owner, "Salary", Direction::Income, &CancelSignal::never())
            .await
            .unwrap()
            .expect("notice");
        assert_eq!(notice.goals.len(), 1);
        assert_eq!(notice.goals[0].goal_id, habit.id);
    }

    #[tokio::test]
    async fn goal_completed_while_pending_leaves_the_sequence() {
        let fx = fixture().await;
        let coffee = fx.store.list_categories(fx.owner).await.unwrap().remove(0);
        let habit = Goal::new(fx.owner, "Coffee", GoalType::Habit, ChallengeMode::Count, date(1), date(30))
            .with_target_count(3);
        fx.store.insert_goal(&habit).await.unwrap();
        let cap = coffee_goal(&fx, 5_000).await;
        let never = CancelSignal::never();

        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap()
            .expect("notice");
        assert_eq!(fx.notifier.current("Coffee").unwrap().goal_id, habit.id);

        add_latte(&fx, &coffee).await;
        add_latte(&fx, &coffee).await;
        let mut rx = fx.bus.subscribe();
        let again = fx
            .notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap();
        assert!(again.is_none());
        assert!(!fx.store.get_goal(habit.id).await.unwrap().unwrap().is_active());

        let current = fx.notifier.current("Coffee").unwrap();
        assert_eq!(current.goal_id, cap.id);
        assert_eq!(current.current_amount, 1_500);
        let step = fx
            .notifier
            .submit(
                "Coffee",
                TargetEdit {
                    target_amount: Some(2_000),
                    ..TargetEdit::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(step, Step::Finished);
        assert!(matches!(rx.try_recv(), Ok(LedgerEvent::GoalCompleted { .. })));
    }

    #[tokio::test]
    async fn notice_closes_when_every_goal_completed_meanwhile() {
        let fx = fixture().await;
        let coffee = fx.store.list_categories(fx.owner).await.unwrap().remove(0);
        let habit = Goal::new(fx.owner, "Coffee", GoalType::Habit, ChallengeMode::Count, date(1), date(30))
            .with_target_count(2);
        fx.store.insert_goal(&habit).await.unwrap();
        let never = CancelSignal::never();
        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap();

        add_latte(&fx, &coffee).await;
        let mut rx = fx.bus.subscribe();
        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap();
        assert!(fx.notifier.pending("Coffee").is_none());
        assert!(matches!(rx.try_recv(), Ok(LedgerEvent::GoalCompleted { .. })));
        assert!(matches!(
            rx.try_recv(),
            Ok(LedgerEvent::ReconciliationClosed { category_name }) if category_name == "Coffee"
        ));
    }

    #[tokio::test]
    async fn goal_created_while_pending_joins_after_the_cursor() {
        let fx = fixture().await;
        let first = coffee_goal(&fx, 500).await;
        let never = CancelSignal::never();
        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap();

        let late = coffee_goal(&fx, 700).await;
        fx.notifier
            .on_ledger_mutated(fx.owner, "Coffee", Direction::Expense, &never)
            .await
            .unwrap();
        let pending = fx.notifier.pending("Coffee").unwrap();
        let ids: Vec<Uuid> = pending.goals.iter().map(|g| g.goal_id).collect();
        assert_eq!(ids, vec![first.id, late.id]);
        assert_eq!(fx.notifier.current("Coffee").unwrap().goal_id, first.id);

        assert!(matches!(fx.notifier.skip("Coffee").unwrap(), Step::Next(g) if g.goal_id == late.id));
        assert_eq!(fx.notifier.skip("Coffee").unwrap(), Step::Finished);
    }
}
