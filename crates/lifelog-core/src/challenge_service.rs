//! Starting a challenge from a category's current-month aggregate.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use lifelog_domain::{normalize_name, ChallengeMode, DateRange, Direction, Goal, GoalProgress, GoalType};

use crate::{
    goal_evaluator::tally, goal_service::GoalService, storage::LedgerStore, time::Clock, CoreError,
    CoreResult,
};

/// Where a category stands in the current period, as shown when a challenge is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBaseline {
    pub category_name: String,
    pub direction: Direction,
    pub current_amount: u64,
    pub current_count: u32,
}

impl CategoryBaseline {
    pub fn progress(&self) -> GoalProgress {
        GoalProgress {
            amount: self.current_amount,
            count: self.current_count,
        }
    }
}

/// Form state for a new challenge. Both targets are independently toggleable.
///
/// For `IncreaseIncome` the amount is an increment on top of the baseline; for
/// `ReduceExpense` it is the cap itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDraft {
    pub category_name: String,
    pub goal_type: GoalType,
    pub enable_amount_goal: bool,
    pub enable_count_goal: bool,
    pub target_amount: Option<u64>,
    pub target_count: Option<u32>,
    pub target_date: NaiveDate,
}

impl ChallengeDraft {
    /// Only the amount target starts enabled.
    pub fn from_category(
        baseline: &CategoryBaseline,
        goal_type: GoalType,
        target_date: NaiveDate,
    ) -> Self {
        Self {
            category_name: baseline.category_name.clone(),
            goal_type,
            enable_amount_goal: true,
            enable_count_goal: false,
            target_amount: None,
            target_count: None,
            target_date,
        }
    }

    /// A reduction needs at least two occurrences to reduce from.
    pub fn count_goal_available(&self, baseline: &CategoryBaseline) -> bool {
        self.goal_type != GoalType::ReduceExpense || baseline.current_count > 1
    }
}

/// Targets as they will be stored on the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeTargets {
    pub mode: ChallengeMode,
    pub target_amount: Option<u64>,
    pub target_count: Option<u32>,
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::Validation(message.into())
}

/// Checks a draft against the baseline it was started from.
pub fn validate(
    draft: &ChallengeDraft,
    baseline: &CategoryBaseline,
    today: NaiveDate,
) -> CoreResult<ChallengeTargets> {
    if normalize_name(&draft.category_name) != normalize_name(&baseline.category_name) {
        return Err(invalid("draft and baseline refer to different categories"));
    }
    if draft.goal_type != GoalType::Habit
        && draft.goal_type.source_direction() != baseline.direction
    {
        return Err(invalid(format!(
            "a {} challenge cannot track a {} category",
            draft.goal_type, baseline.direction
        )));
    }
    let mode = ChallengeMode::from_toggles(draft.enable_amount_goal, draft.enable_count_goal)
        .ok_or_else(|| invalid("enable an amount or a count target"))?;
    if draft.target_date < today {
        return Err(invalid("target date is in the past"));
    }

    let target_amount = if draft.enable_amount_goal {
        let entered = draft
            .target_amount
            .ok_or_else(|| invalid("amount target is enabled but empty"))?;
        Some(amount_target(draft.goal_type, entered, baseline)?)
    } else {
        None
    };

    let target_count = if draft.enable_count_goal {
        if !draft.count_goal_available(baseline) {
            return Err(invalid("a single occurrence cannot be reduced further"));
        }
        let entered = draft
            .target_count
            .ok_or_else(|| invalid("count target is enabled but empty"))?;
        Some(count_target(draft.goal_type, entered, baseline)?)
    } else {
        None
    };

    Ok(ChallengeTargets {
        mode,
        target_amount,
        target_count,
    })
}

fn amount_target(goal_type: GoalType, entered: u64, baseline: &CategoryBaseline) -> CoreResult<u64> {
    match goal_type {
        GoalType::ReduceExpense if entered >= baseline.current_amount => Err(invalid(format!(
            "target amount must be below the current {}",
            baseline.current_amount
        ))),
        GoalType::ReduceExpense => Ok(entered),
        GoalType::IncreaseIncome if entered == 0 => Err(invalid("increase must be positive")),
        GoalType::IncreaseIncome => baseline
            .current_amount
            .checked_add(entered)
            .ok_or_else(|| invalid("target amount is too large")),
        GoalType::Habit if entered == 0 => Err(invalid("target amount must be positive")),
        GoalType::Habit => Ok(entered),
    }
}

fn count_target(goal_type: GoalType, entered: u32, baseline: &CategoryBaseline) -> CoreResult<u32> {
    let ok = match goal_type {
        GoalType::ReduceExpense => entered < baseline.current_count,
        GoalType::IncreaseIncome => entered > baseline.current_count,
        GoalType::Habit => entered > 0,
    };
    if ok {
        Ok(entered)
    } else {
        Err(invalid(format!(
            "target count {entered} does not fit a {goal_type} challenge from {}",
            baseline.current_count
        )))
    }
}

#[derive(Clone)]
pub struct ChallengeService {
    store: Arc<dyn LedgerStore>,
    goals: GoalService,
    clock: Arc<dyn Clock>,
}

impl ChallengeService {
    pub fn new(store: Arc<dyn LedgerStore>, goals: GoalService, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            goals,
            clock,
        }
    }

    /// Current-month amount and count for one category.
    pub async fn baseline(
        &self,
        owner_id: Uuid,
        category_name: &str,
        direction: Direction,
    ) -> CoreResult<CategoryBaseline> {
        let range = DateRange::month_containing(self.clock.today());
        let (records, categories) = tokio::try_join!(
            async {
                self.store
                    .list_records(owner_id, direction, Some(range))
                    .await
                    .map_err(CoreError::read("load category baseline"))
            },
            async {
                self.store
                    .list_categories(owner_id)
                    .await
                    .map_err(CoreError::read("load categories"))
            },
        )?;
        let progress = tally(&records, &categories, category_name);
        Ok(CategoryBaseline {
            category_name: category_name.to_string(),
            direction,
            current_amount: progress.amount,
            current_count: progress.count,
        })
    }

    pub fn validate(
        &self,
        draft: &ChallengeDraft,
        baseline: &CategoryBaseline,
    ) -> CoreResult<ChallengeTargets> {
        validate(draft, baseline, self.clock.today())
    }

    /// Validates and stores a new active goal seeded with the baseline as its progress.
    pub async fn create(
        &self,
        owner_id: Uuid,
        draft: &ChallengeDraft,
        baseline: &CategoryBaseline,
    ) -> CoreResult<Goal> {
        let targets = self.validate(draft, baseline)?;
        let mut goal = Goal::new(
            owner_id,
            baseline.category_name.clone(),
            draft.goal_type,
            targets.mode,
            self.clock.today(),
            draft.target_date,
        )
        .with_progress(baseline.progress());
        goal.target_amount = targets.target_amount;
        goal.target_count = targets.target_count;
        self.goals.insert(&goal).await?;
        Ok(goal)
    }
}
