//! Goal persistence and target edits.

use std::sync::Arc;

use uuid::Uuid;

use lifelog_domain::{ChallengeMode, Goal, TargetEdit};

use crate::{storage::LedgerStore, CoreError, CoreResult};

#[derive(Clone)]
pub struct GoalService {
    store: Arc<dyn LedgerStore>,
}

impl GoalService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Goal> {
        self.store
            .get_goal(id)
            .await
            .map_err(CoreError::read("load goal"))?
            .ok_or(CoreError::GoalNotFound(id))
    }

    pub async fn list(&self, owner_id: Uuid) -> CoreResult<Vec<Goal>> {
        self.store
            .list_goals(owner_id)
            .await
            .map_err(CoreError::read("load goals"))
    }

    pub async fn list_active(&self, owner_id: Uuid) -> CoreResult<Vec<Goal>> {
        let mut goals = self.list(owner_id).await?;
        goals.retain(Goal::is_active);
        Ok(goals)
    }

    pub async fn insert(&self, goal: &Goal) -> CoreResult<()> {
        self.store
            .insert_goal(goal)
            .await
            .map_err(CoreError::write("create goal"))?;
        tracing::debug!(goal_id = %goal.id, title = %goal.title, "goal created");
        Ok(())
    }

    /// Replaces the targets of an active goal. Progress fields are never written here.
    pub async fn update_targets(&self, id: Uuid, edit: TargetEdit) -> CoreResult<Goal> {
        let mut goal = self.get(id).await?;
        if !goal.is_active() {
            return Err(CoreError::InvalidTransition(format!(
                "goal `{}` is already {}",
                goal.title, goal.status
            )));
        }
        check_edit(goal.challenge_mode, &edit)?;
        goal.apply_targets(&edit);
        self.store
            .update_goal(&goal)
            .await
            .map_err(CoreError::write("update goal targets"))?;
        tracing::info!(goal_id = %id, "goal targets updated");
        Ok(goal)
    }
}

fn check_edit(mode: ChallengeMode, edit: &TargetEdit) -> CoreResult<()> {
    let ok = match mode {
        ChallengeMode::Amount => edit.target_amount.is_some(),
        ChallengeMode::Count => edit.target_count.is_some(),
        ChallengeMode::Both => edit.target_amount.is_some() || edit.target_count.is_some(),
    };
    if ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "a {mode} challenge needs a matching target"
        )))
    }
}
