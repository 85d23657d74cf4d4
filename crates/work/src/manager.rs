//! Goal management service.
//!
//! Loads snapshots from storage, hands them to the readiness selector and
//! the breakpoint detector, and persists what they derive.

use async_trait::async_trait;
use chance_core::{
    Action, ActionId, ActionStatus, Breakpoint, BreakpointId, CompletionEvent, CompletionStatus,
    EnergyLevel, EventId, Goal, GoalId, GoalStatus, Time,
};
use chance_execution::{select_ready, MesSelector, ReadyActionView};
use chance_progress::{
    detect_breakpoints, goal_progress, window_start, GoalProgress, ParasiticReport, PatternRisk,
    Summary,
};
use chance_storage::{ActionFilter, BreakpointFilter, EntityKind, EventFilter, Storage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::{BreakpointPolicy, WorkConfig};
use crate::decompose::{validate_plan, ActionDraft, Decomposer};
use crate::error::{Result, WorkError};

/// Goal management service.
#[async_trait]
pub trait GoalManager: Send + Sync {
    /// Create a goal and decompose it into actions.
    async fn create_goal(&self, spec: GoalSpec) -> Result<GoalDetail>;

    /// List all goals.
    async fn list_goals(&self) -> Result<Vec<Goal>>;

    /// A goal with its actions and progress.
    async fn goal_detail(&self, goal_id: GoalId) -> Result<GoalDetail>;

    /// Progress of a goal.
    async fn progress(&self, goal_id: GoalId) -> Result<GoalProgress>;

    /// Change description and/or status.
    async fn update_goal(&self, goal_id: GoalId, update: GoalUpdate) -> Result<Goal>;

    /// Soft delete: mark the goal cancelled.
    async fn cancel_goal(&self, goal_id: GoalId) -> Result<Goal>;

    /// Replace a goal's actions with a fresh decomposition.
    async fn redecompose(&self, goal_id: GoalId) -> Result<Vec<Action>>;

    /// Add one action to a goal.
    async fn add_action(&self, goal_id: GoalId, spec: NewAction) -> Result<Action>;

    /// Set an action's status directly.
    async fn set_action_status(
        &self,
        action_id: ActionId,
        status: ActionStatus,
    ) -> Result<Action>;

    /// Ranked next steps of a goal, at most `limit` (configured default when `None`).
    async fn next_steps(
        &self,
        goal_id: GoalId,
        limit: Option<usize>,
    ) -> Result<Vec<ReadyActionView>>;

    /// Record an outcome and run breakpoint detection on failures.
    async fn log_event(&self, entry: EventEntry) -> Result<LoggedEvent>;

    /// Record several outcomes, skipping unknown actions.
    async fn log_batch(&self, entries: Vec<EventEntry>) -> Result<Vec<CompletionEvent>>;

    /// Events matching the filter, oldest first.
    async fn events(&self, filter: EventFilter) -> Result<Vec<CompletionEvent>>;

    /// Stored breakpoints, optionally of one action.
    async fn breakpoints(&self, action_id: Option<ActionId>) -> Result<Vec<Breakpoint>>;

    /// Recent activity summary.
    async fn summary(&self) -> Result<Summary>;

    /// Recent breakpoint causes and repeatedly failing actions.
    async fn parasitic(&self) -> Result<ParasiticReport>;

    /// Breakpoint patterns ranked by risk.
    async fn prediction(&self) -> Result<Vec<PatternRisk>>;
}

/// Specification for creating a goal.
#[derive(Debug, Clone)]
pub struct GoalSpec {
    /// Free-text description, also fed to the decomposer
    pub description: String,
    /// Whether the outcome is measurable
    pub measurable: bool,
    /// Optional deadline
    pub time_bound: Option<Time>,
}

impl GoalSpec {
    /// A measurable goal without deadline.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            measurable: true,
            time_bound: None,
        }
    }
}

/// Partial goal update.
#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    /// New description
    pub description: Option<String>,
    /// New status
    pub status: Option<GoalStatus>,
}

/// Specification for adding an action by hand.
#[derive(Debug, Clone)]
pub struct NewAction {
    /// What to do
    pub description: String,
    /// Estimated minutes
    pub duration_min: u32,
    /// Energy required
    pub energy_level: EnergyLevel,
    /// Urgency
    pub priority: i32,
    /// Actions that must be done first
    pub dependencies: Vec<ActionId>,
}

/// A goal with everything under it.
#[derive(Debug, Clone)]
pub struct GoalDetail {
    /// The goal
    pub goal: Goal,
    /// Its actions, ordered by id
    pub actions: Vec<Action>,
    /// Progress computed from the actions
    pub progress: GoalProgress,
}

/// An outcome to record.
#[derive(Debug, Clone)]
pub struct EventEntry {
    /// The action attempted
    pub action_id: ActionId,
    /// Outcome
    pub status: CompletionStatus,
    /// Why it failed
    pub failure_reason: Option<String>,
}

/// Result of logging one event.
#[derive(Debug, Clone)]
pub struct LoggedEvent {
    /// The stored event
    pub event: CompletionEvent,
    /// Breakpoints stored as a consequence
    pub breakpoints: Vec<Breakpoint>,
}

/// Basic goal manager implementation.
pub struct BasicGoalManager<S: Storage> {
    storage: Arc<Mutex<S>>,
    decomposer: Arc<dyn Decomposer>,
    config: WorkConfig,
    mes_cache: Mutex<TtlCache<GoalId, Vec<ReadyActionView>>>,
}

impl<S: Storage> BasicGoalManager<S> {
    /// Create a new goal manager.
    pub fn new(storage: S, decomposer: Arc<dyn Decomposer>, config: WorkConfig) -> Self {
        let mes_cache = Mutex::new(TtlCache::new(config.cache_ttl()));
        Self {
            storage: Arc::new(Mutex::new(storage)),
            decomposer,
            config,
            mes_cache,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &WorkConfig {
        &self.config
    }

    async fn invalidate(&self, goal_id: GoalId) {
        if self.mes_cache.lock().await.invalidate(&goal_id) {
            debug!(%goal_id, "invalidated cached next steps");
        }
    }

    async fn decompose(&self, description: &str) -> Result<Vec<ActionDraft>> {
        let drafts = self.decomposer.decompose(description).await?;
        validate_plan(&drafts)?;
        Ok(drafts)
    }

    /// Persist drafts as actions of `goal_id`, mapping plan positions to ids.
    async fn create_actions(
        storage: &mut S,
        goal_id: GoalId,
        drafts: Vec<ActionDraft>,
    ) -> Result<Vec<Action>> {
        let mut ids = Vec::with_capacity(drafts.len());
        for _ in &drafts {
            ids.push(ActionId::new(storage.allocate_id(EntityKind::Action).await?));
        }

        let mut actions = Vec::with_capacity(drafts.len());
        for (id, draft) in ids.iter().copied().zip(drafts) {
            let dependencies: Vec<ActionId> =
                draft.depends_on.iter().map(|pos| ids[*pos]).collect();
            let status = if dependencies.is_empty() {
                ActionStatus::Available
            } else {
                ActionStatus::Pending
            };

            let action = Action::new(
                id,
                goal_id,
                draft.description,
                draft.duration_min,
                draft.energy_level,
            )
            .with_priority(draft.priority)
            .with_status(status)
            .with_dependencies(dependencies);
            storage.save_action(&action).await?;
            actions.push(action);
        }

        Ok(actions)
    }

    /// Remove a goal and whatever actions were already written for it.
    async fn discard_goal(storage: &mut S, goal_id: GoalId) -> chance_storage::Result<()> {
        for action in storage.list_actions(&ActionFilter::for_goal(goal_id)).await? {
            storage.delete_action(action.id).await?;
        }
        storage.delete_goal(goal_id).await?;
        storage.rollback().await
    }

    /// Selector narrowing a ranked list to what the caller asked for.
    fn selector(&self, limit: Option<usize>) -> MesSelector {
        let selector = MesSelector::new().with_limit(limit.unwrap_or(self.config.mes_limit));
        match self.config.mes_min_priority {
            Some(min) => selector.with_min_priority(min),
            None => selector,
        }
    }

    async fn load_goal(storage: &S, goal_id: GoalId) -> Result<Goal> {
        storage
            .load_goal(goal_id)
            .await?
            .ok_or(WorkError::GoalNotFound(goal_id))
    }

    async fn load_action(storage: &S, action_id: ActionId) -> Result<Action> {
        storage
            .load_action(action_id)
            .await?
            .ok_or(WorkError::ActionNotFound(action_id))
    }

    /// Save an event and apply its outcome to the action.
    async fn record(
        storage: &mut S,
        action: &mut Action,
        entry: &EventEntry,
    ) -> Result<CompletionEvent> {
        let id = EventId::new(storage.allocate_id(EntityKind::Event).await?);
        let mut event = CompletionEvent::new(id, action.id, action.goal_id, entry.status);
        event.failure_reason = entry.failure_reason.clone();
        storage.save_event(&event).await?;

        let new_status = match entry.status {
            CompletionStatus::Done => Some(ActionStatus::Done),
            CompletionStatus::Blocked => Some(ActionStatus::Blocked),
            CompletionStatus::Failed => None,
        };
        if let Some(status) = new_status {
            action.status = status;
            storage.save_action(action).await?;
        }

        Ok(event)
    }

    /// Run detection over one action's events and store the result.
    async fn store_breakpoints(
        &self,
        storage: &mut S,
        action_id: ActionId,
    ) -> Result<Vec<Breakpoint>> {
        let events = storage.list_events(&EventFilter::for_action(action_id)).await?;
        let candidates = detect_breakpoints(&events);

        let mut stored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.config.breakpoint_policy == BreakpointPolicy::Upsert {
                let removed = storage.delete_breakpoints(candidate.action_id).await?;
                debug!(action_id = %candidate.action_id, removed, "replaced earlier breakpoints");
            }

            let id = BreakpointId::new(storage.allocate_id(EntityKind::Breakpoint).await?);
            let breakpoint = candidate.into_breakpoint(id, Utc::now());
            storage.save_breakpoint(&breakpoint).await?;
            info!(
                action_id = %breakpoint.action_id,
                failures = breakpoint.failure_count,
                pattern = %breakpoint.pattern,
                "breakpoint detected"
            );
            stored.push(breakpoint);
        }

        Ok(stored)
    }
}

#[async_trait]
impl<S: Storage + 'static> GoalManager for BasicGoalManager<S> {
    async fn create_goal(&self, spec: GoalSpec) -> Result<GoalDetail> {
        // Decompose before touching storage so a failed plan leaves nothing behind.
        let drafts = self.decompose(&spec.description).await?;

        let mut storage = self.storage.lock().await;
        let id = GoalId::new(storage.allocate_id(EntityKind::Goal).await?);
        let mut goal = Goal::new(id, spec.description);
        goal.measurable = spec.measurable;
        goal.time_bound = spec.time_bound;
        storage.save_goal(&goal).await?;

        let actions = match Self::create_actions(&mut storage, goal.id, drafts).await {
            Ok(actions) => actions,
            Err(e) => {
                if let Err(cleanup) = Self::discard_goal(&mut storage, goal.id).await {
                    warn!(goal_id = %goal.id, error = %cleanup, "could not discard partial goal");
                }
                return Err(e);
            }
        };
        storage.commit(&format!("Create goal {}", goal.id)).await?;

        info!(goal_id = %goal.id, actions = actions.len(), "goal created");
        let progress = goal_progress(&actions);
        Ok(GoalDetail { goal, actions, progress })
    }

    async fn list_goals(&self) -> Result<Vec<Goal>> {
        Ok(self.storage.lock().await.list_goals().await?)
    }

    async fn goal_detail(&self, goal_id: GoalId) -> Result<GoalDetail> {
        let storage = self.storage.lock().await;
        let goal = Self::load_goal(&storage, goal_id).await?;
        let actions = storage.list_actions(&ActionFilter::for_goal(goal_id)).await?;
        let progress = goal_progress(&actions);
        Ok(GoalDetail { goal, actions, progress })
    }

    async fn progress(&self, goal_id: GoalId) -> Result<GoalProgress> {
        Ok(self.goal_detail(goal_id).await?.progress)
    }

    async fn update_goal(&self, goal_id: GoalId, update: GoalUpdate) -> Result<Goal> {
        let mut storage = self.storage.lock().await;
        let mut goal = Self::load_goal(&storage, goal_id).await?;

        if let Some(description) = update.description.filter(|d| !d.is_empty()) {
            goal.description = description;
        }
        if let Some(status) = update.status {
            goal.status = status;
        }

        storage.save_goal(&goal).await?;
        storage.commit(&format!("Update goal {}", goal_id)).await?;
        Ok(goal)
    }

    async fn cancel_goal(&self, goal_id: GoalId) -> Result<Goal> {
        self.update_goal(
            goal_id,
            GoalUpdate {
                status: Some(GoalStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
    }

    async fn redecompose(&self, goal_id: GoalId) -> Result<Vec<Action>> {
        let description = {
            let storage = self.storage.lock().await;
            Self::load_goal(&storage, goal_id).await?.description
        };
        let drafts = self.decompose(&description).await?;

        let mut storage = self.storage.lock().await;
        for old in storage.list_actions(&ActionFilter::for_goal(goal_id)).await? {
            storage.delete_action(old.id).await?;
        }
        let actions = Self::create_actions(&mut storage, goal_id, drafts).await?;
        storage.commit(&format!("Redecompose goal {}", goal_id)).await?;
        drop(storage);

        self.invalidate(goal_id).await;
        info!(%goal_id, actions = actions.len(), "goal redecomposed");
        Ok(actions)
    }

    async fn add_action(&self, goal_id: GoalId, spec: NewAction) -> Result<Action> {
        let mut storage = self.storage.lock().await;
        Self::load_goal(&storage, goal_id).await?;

        let id = ActionId::new(storage.allocate_id(EntityKind::Action).await?);
        let status = if spec.dependencies.is_empty() {
            ActionStatus::Available
        } else {
            ActionStatus::Pending
        };
        let action = Action::new(
            id,
            goal_id,
            spec.description,
            spec.duration_min,
            spec.energy_level,
        )
        .with_priority(spec.priority)
            .with_status(status)
            .with_dependencies(spec.dependencies);
        action.validate()?;

        storage.save_action(&action).await?;
        storage.commit(&format!("Add action {}", action.id)).await?;
        drop(storage);

        self.invalidate(goal_id).await;
        Ok(action)
    }

    async fn set_action_status(
        &self,
        action_id: ActionId,
        status: ActionStatus,
    ) -> Result<Action> {
        let mut storage = self.storage.lock().await;
        let mut action = Self::load_action(&storage, action_id).await?;
        action.status = status;
        storage.save_action(&action).await?;
        storage.commit(&format!("Set action {} {}", action_id, status)).await?;
        drop(storage);

        self.invalidate(action.goal_id).await;
        Ok(action)
    }

    async fn next_steps(
        &self,
        goal_id: GoalId,
        limit: Option<usize>,
    ) -> Result<Vec<ReadyActionView>> {
        let selector = self.selector(limit);

        if let Some(cached) = self.mes_cache.lock().await.get(&goal_id) {
            debug!(%goal_id, "next steps served from cache");
            return Ok(selector.narrow(cached));
        }

        // The entry is inserted before the storage guard is released, so every
        // write to this goal lands either before the read or before its own
        // invalidation.
        let storage = self.storage.lock().await;
        Self::load_goal(&storage, goal_id).await?;
        let actions = storage.list_actions(&ActionFilter::for_goal(goal_id)).await?;
        let ready = select_ready(&actions);
        self.mes_cache.lock().await.set(goal_id, ready.clone());
        drop(storage);

        Ok(selector.narrow(ready))
    }

    async fn log_event(&self, entry: EventEntry) -> Result<LoggedEvent> {
        let mut storage = self.storage.lock().await;
        let mut action = Self::load_action(&storage, entry.action_id).await?;

        let event = Self::record(&mut storage, &mut action, &entry).await?;
        storage.commit(&format!("Log {} for action {}", event.status, action.id)).await?;

        let breakpoints = match entry.status {
            CompletionStatus::Failed | CompletionStatus::Blocked => {
                let found = self.store_breakpoints(&mut storage, action.id).await?;
                if !found.is_empty() {
                    storage.commit(&format!("Breakpoints for action {}", action.id)).await?;
                }
                found
            }
            CompletionStatus::Done => Vec::new(),
        };
        drop(storage);

        self.invalidate(action.goal_id).await;
        info!(action_id = %action.id, status = %event.status, "event logged");
        Ok(LoggedEvent { event, breakpoints })
    }

    async fn log_batch(&self, entries: Vec<EventEntry>) -> Result<Vec<CompletionEvent>> {
        let mut storage = self.storage.lock().await;
        let mut events = Vec::with_capacity(entries.len());
        let mut touched = Vec::new();

        for entry in &entries {
            let Some(mut action) = storage.load_action(entry.action_id).await? else {
                warn!(action_id = %entry.action_id, "skipping event for unknown action");
                continue;
            };
            events.push(Self::record(&mut storage, &mut action, entry).await?);
            if !touched.contains(&action.goal_id) {
                touched.push(action.goal_id);
            }
        }

        storage.commit(&format!("Log {} events", events.len())).await?;
        drop(storage);

        for goal_id in touched {
            self.invalidate(goal_id).await;
        }
        Ok(events)
    }

    async fn events(&self, filter: EventFilter) -> Result<Vec<CompletionEvent>> {
        Ok(self.storage.lock().await.list_events(&filter).await?)
    }

    async fn breakpoints(&self, action_id: Option<ActionId>) -> Result<Vec<Breakpoint>> {
        let filter = BreakpointFilter {
            action_id,
            ..Default::default()
        };
        Ok(self.storage.lock().await.list_breakpoints(&filter).await?)
    }

    async fn summary(&self) -> Result<Summary> {
        let now = Utc::now();
        let window = self.config.stats_window();
        let storage = self.storage.lock().await;

        let goals = storage.list_goals().await?;
        let events = storage
            .list_events(&EventFilter {
                since: window_start(now, window),
                ..Default::default()
            })
            .await?;
        Ok(chance_progress::summarize(&goals, &events, now, window))
    }

    async fn parasitic(&self) -> Result<ParasiticReport> {
        let now = Utc::now();
        let window = self.config.stats_window();
        let storage = self.storage.lock().await;

        let breakpoints = storage
            .list_breakpoints(&BreakpointFilter {
                since: window_start(now, window),
                ..Default::default()
            })
            .await?;
        let events = storage
            .list_events(&EventFilter {
                status: Some(CompletionStatus::Failed),
                since: window_start(now, window),
                ..Default::default()
            })
            .await?;
        Ok(chance_progress::parasitic(
            &breakpoints,
            &events,
            now,
            window,
            self.config.parasitic_min_failures,
        ))
    }

    async fn prediction(&self) -> Result<Vec<PatternRisk>> {
        let storage = self.storage.lock().await;
        let breakpoints = storage.list_breakpoints(&BreakpointFilter::default()).await?;
        let total_events = storage.list_events(&EventFilter::default()).await?.len();
        Ok(chance_progress::predict(&breakpoints, total_events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::{SingleStepDecomposer, StaticDecomposer};
    use chance_core::{BreakpointPattern, CoreError};
    use chance_storage::{JsonStorage, StorageError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// JSON storage that can hold `list_actions` open and fail one action save.
    struct ScriptedStorage {
        inner: JsonStorage,
        pause_listing: Arc<AtomicBool>,
        listing: Arc<Notify>,
        resume: Arc<Notify>,
        fail_action_save: Option<usize>,
        action_saves: usize,
    }

    impl ScriptedStorage {
        fn new(inner: JsonStorage) -> Self {
            Self {
                inner,
                pause_listing: Arc::new(AtomicBool::new(false)),
                listing: Arc::new(Notify::new()),
                resume: Arc::new(Notify::new()),
                fail_action_save: None,
                action_saves: 0,
            }
        }
    }

    #[async_trait]
    impl Storage for ScriptedStorage {
        async fn allocate_id(&mut self, kind: EntityKind) -> chance_storage::Result<u64> {
            self.inner.allocate_id(kind).await
        }

        async fn save_goal(&mut self, goal: &Goal) -> chance_storage::Result<()> {
            self.inner.save_goal(goal).await
        }

        async fn load_goal(&self, id: GoalId) -> chance_storage::Result<Option<Goal>> {
            self.inner.load_goal(id).await
        }

        async fn list_goals(&self) -> chance_storage::Result<Vec<Goal>> {
            self.inner.list_goals().await
        }

        async fn delete_goal(&mut self, id: GoalId) -> chance_storage::Result<()> {
            self.inner.delete_goal(id).await
        }

        async fn save_action(&mut self, action: &Action) -> chance_storage::Result<()> {
            self.action_saves += 1;
            if self.fail_action_save == Some(self.action_saves) {
                return Err(StorageError::Other("disk full".to_string()));
            }
            self.inner.save_action(action).await
        }

        async fn load_action(&self, id: ActionId) -> chance_storage::Result<Option<Action>> {
            self.inner.load_action(id).await
        }

        async fn list_actions(
            &self,
            filter: &ActionFilter,
        ) -> chance_storage::Result<Vec<Action>> {
            if self.pause_listing.swap(false, Ordering::SeqCst) {
                self.listing.notify_one();
                self.resume.notified().await;
            }
            self.inner.list_actions(filter).await
        }

        async fn delete_action(&mut self, id: ActionId) -> chance_storage::Result<()> {
            self.inner.delete_action(id).await
        }

        async fn save_event(&mut self, event: &CompletionEvent) -> chance_storage::Result<()> {
            self.inner.save_event(event).await
        }

        async fn list_events(
            &self,
            filter: &EventFilter,
        ) -> chance_storage::Result<Vec<CompletionEvent>> {
            self.inner.list_events(filter).await
        }

        async fn save_breakpoint(&mut self, breakpoint: &Breakpoint) -> chance_storage::Result<()> {
            self.inner.save_breakpoint(breakpoint).await
        }

        async fn list_breakpoints(
            &self,
            filter: &BreakpointFilter,
        ) -> chance_storage::Result<Vec<Breakpoint>> {
            self.inner.list_breakpoints(filter).await
        }

        async fn delete_breakpoints(
            &mut self,
            action_id: ActionId,
        ) -> chance_storage::Result<usize> {
            self.inner.delete_breakpoints(action_id).await
        }

        async fn commit(&mut self, message: &str) -> chance_storage::Result<()> {
            self.inner.commit(message).await
        }

        async fn rollback(&mut self) -> chance_storage::Result<()> {
            self.inner.rollback().await
        }
    }

    fn plan() -> Vec<ActionDraft> {
        vec![
            ActionDraft::new("Research", 30, EnergyLevel::Medium),
            ActionDraft {
                priority: 8,
                ..ActionDraft::new("Outline", 15, EnergyLevel::Low).after(vec![0])
            },
            ActionDraft {
                priority: 6,
                ..ActionDraft::new("Draft", 20, EnergyLevel::High).after(vec![0])
            },
        ]
    }

    async fn manager_with(
        drafts: Vec<ActionDraft>,
        policy: BreakpointPolicy,
    ) -> (tempfile::TempDir, BasicGoalManager<JsonStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let config = WorkConfig {
            data_dir: dir.path().to_path_buf(),
            breakpoint_policy: policy,
            ..Default::default()
        };
        let manager =
            BasicGoalManager::new(storage, Arc::new(StaticDecomposer::new(drafts)), config);
        (dir, manager)
    }

    fn entry(action_id: ActionId, status: CompletionStatus, reason: Option<&str>) -> EventEntry {
        EventEntry {
            action_id,
            status,
            failure_reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_goal_maps_plan_positions() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;

        let detail = manager.create_goal(GoalSpec::new("Write a paper")).await.unwrap();
        assert_eq!(detail.actions.len(), 3);

        let research = detail.actions[0].id;
        assert_eq!(detail.actions[0].status, ActionStatus::Available);
        assert_eq!(detail.actions[1].status, ActionStatus::Pending);
        assert_eq!(detail.actions[1].dependencies, vec![research]);
        assert_eq!(detail.actions[2].dependencies, vec![research]);
        assert_eq!(detail.progress.total, 3);
    }

    #[tokio::test]
    async fn test_invalid_plan_creates_nothing() {
        let bad = vec![ActionDraft::new("a", 10, EnergyLevel::Low).after(vec![3])];
        let (_dir, manager) = manager_with(bad, BreakpointPolicy::Append).await;

        let err = manager.create_goal(GoalSpec::new("x")).await.unwrap_err();
        assert!(matches!(err, WorkError::InvalidActionData(CoreError::InvalidActionData { .. })));
        assert!(manager.list_goals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_next_steps_follow_completion() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("Write a paper")).await.unwrap();
        let goal_id = detail.goal.id;
        let ids: Vec<ActionId> = detail.actions.iter().map(|a| a.id).collect();

        let steps = manager.next_steps(goal_id, None).await.unwrap();
        assert_eq!(steps.iter().map(|s| s.action_id).collect::<Vec<_>>(), vec![ids[0]]);

        // Logging done must invalidate the cached list.
        manager.log_event(entry(ids[0], CompletionStatus::Done, None)).await.unwrap();
        let steps = manager.next_steps(goal_id, None).await.unwrap();
        assert_eq!(steps.iter().map(|s| s.action_id).collect::<Vec<_>>(), vec![ids[1], ids[2]]);

        let steps = manager.next_steps(goal_id, Some(1)).await.unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[tokio::test]
    async fn test_next_steps_unknown_goal() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let err = manager.next_steps(GoalId::new(99), None).await.unwrap_err();
        assert!(matches!(err, WorkError::GoalNotFound(_)));
    }

    #[tokio::test]
    async fn test_repeated_failures_store_breakpoint() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let action = detail.actions[0].id;

        let first = manager
            .log_event(entry(action, CompletionStatus::Failed, Some("energy too low")))
            .await
            .unwrap();
        assert!(first.breakpoints.is_empty());

        let second = manager
            .log_event(entry(action, CompletionStatus::Failed, Some("no time")))
            .await
            .unwrap();
        assert_eq!(second.breakpoints.len(), 1);
        assert_eq!(second.breakpoints[0].pattern, BreakpointPattern::Energy);
        assert_eq!(second.breakpoints[0].failure_count, 2);

        manager
            .log_event(entry(action, CompletionStatus::Failed, None))
            .await
            .unwrap();
        assert_eq!(manager.breakpoints(Some(action)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_policy_keeps_latest_only() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Upsert).await;
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let action = detail.actions[0].id;

        for _ in 0..3 {
            manager
                .log_event(entry(action, CompletionStatus::Failed, Some("external meeting")))
                .await
                .unwrap();
        }

        let stored = manager.breakpoints(Some(action)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].failure_count, 3);
        assert_eq!(stored[0].pattern, BreakpointPattern::External);
    }

    #[tokio::test]
    async fn test_blocked_event_blocks_action() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let action = detail.actions[0].id;

        let logged = manager
            .log_event(entry(action, CompletionStatus::Blocked, Some("waiting on landlord")))
            .await
            .unwrap();
        assert_eq!(logged.event.goal_id, detail.goal.id);

        let detail = manager.goal_detail(detail.goal.id).await.unwrap();
        assert_eq!(detail.actions[0].status, ActionStatus::Blocked);
        let progress = manager.progress(detail.goal.id).await.unwrap();
        assert_eq!(progress.blocked, 1);
        assert_eq!(progress.ready, 0);
        assert!(manager.next_steps(detail.goal.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_event_unknown_action() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let err = manager
            .log_event(entry(ActionId::new(42), CompletionStatus::Done, None))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkError::ActionNotFound(_)));
    }

    #[tokio::test]
    async fn test_batch_skips_unknown_actions() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let action = detail.actions[0].id;

        let events = manager
            .log_batch(vec![
                entry(action, CompletionStatus::Failed, Some("tired")),
                entry(ActionId::new(999), CompletionStatus::Done, None),
                entry(action, CompletionStatus::Done, None),
            ])
            .await
            .unwrap();
        assert_eq!(events.len(), 2);

        let logged = manager.events(EventFilter::for_action(action)).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].status, CompletionStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancel_and_update_goal() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("old")).await.unwrap();

        let goal = manager
            .update_goal(
                detail.goal.id,
                GoalUpdate {
                    description: Some("new".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(goal.description, "new");
        assert_eq!(goal.status, GoalStatus::Active);

        let goal = manager.cancel_goal(detail.goal.id).await.unwrap();
        assert_eq!(goal.status, GoalStatus::Cancelled);
        assert_eq!(manager.list_goals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_redecompose_replaces_actions() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let old_ids: Vec<ActionId> = detail.actions.iter().map(|a| a.id).collect();

        let fresh = manager.redecompose(detail.goal.id).await.unwrap();
        assert_eq!(fresh.len(), 3);
        assert!(fresh.iter().all(|a| !old_ids.contains(&a.id)));

        let detail = manager.goal_detail(detail.goal.id).await.unwrap();
        assert_eq!(detail.actions, fresh);
    }

    #[tokio::test]
    async fn test_add_action_and_set_status() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let manager =
            BasicGoalManager::new(storage, Arc::new(SingleStepDecomposer), WorkConfig::default());

        let detail = manager.create_goal(GoalSpec::new("Tidy flat")).await.unwrap();
        let first = detail.actions[0].id;

        let added = manager
            .add_action(
                detail.goal.id,
                NewAction {
                    description: "Vacuum".to_string(),
                    duration_min: 20,
                    energy_level: EnergyLevel::Medium,
                    priority: 9,
                    dependencies: vec![first],
                },
            )
            .await
            .unwrap();
        assert_eq!(added.status, ActionStatus::Pending);

        let steps = manager.next_steps(detail.goal.id, None).await.unwrap();
        assert_eq!(steps.len(), 1);

        manager.set_action_status(first, ActionStatus::Done).await.unwrap();
        let steps = manager.next_steps(detail.goal.id, None).await.unwrap();
        assert_eq!(steps[0].action_id, added.id);
    }

    #[tokio::test]
    async fn test_statistics() {
        let (_dir, manager) = manager_with(plan(), BreakpointPolicy::Append).await;
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let action = detail.actions[0].id;

        for reason in ["clarity missing", "clarity missing", "clarity missing"] {
            manager
                .log_event(entry(action, CompletionStatus::Failed, Some(reason)))
                .await
                .unwrap();
        }
        manager.log_event(entry(action, CompletionStatus::Done, None)).await.unwrap();

        let summary = manager.summary().await.unwrap();
        assert_eq!(summary.done_in_window, 1);
        assert_eq!(summary.failure_reasons.get("clarity missing"), Some(&3));

        let report = manager.parasitic().await.unwrap();
        assert_eq!(report.breakpoint_patterns.get(&BreakpointPattern::Clarity), Some(&2));
        assert_eq!(report.negative_utility_actions.len(), 1);

        let risks = manager.prediction().await.unwrap();
        assert_eq!(risks[0].pattern, BreakpointPattern::Clarity);
        assert_eq!(risks[0].risk_percentage, 50.0);
    }

    #[tokio::test]
    async fn test_next_steps_honours_configured_cut_offs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let config = WorkConfig {
            mes_limit: 1,
            mes_min_priority: Some(7),
            ..Default::default()
        };
        let manager =
            BasicGoalManager::new(storage, Arc::new(StaticDecomposer::new(plan())), config);
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let ids: Vec<ActionId> = detail.actions.iter().map(|a| a.id).collect();

        // Research has priority 5, below the configured minimum.
        assert!(manager.next_steps(detail.goal.id, None).await.unwrap().is_empty());

        manager.set_action_status(ids[0], ActionStatus::Done).await.unwrap();
        let steps = manager.next_steps(detail.goal.id, None).await.unwrap();
        assert_eq!(steps.iter().map(|s| s.action_id).collect::<Vec<_>>(), vec![ids[1]]);

        // Served from cache, still narrowed per call.
        let steps = manager.next_steps(detail.goal.id, Some(5)).await.unwrap();
        assert_eq!(steps.iter().map(|s| s.action_id).collect::<Vec<_>>(), vec![ids[1]]);
    }

    #[tokio::test]
    async fn test_write_during_next_steps_read_reaches_cache() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScriptedStorage::new(JsonStorage::new(dir.path()).await.unwrap());
        let (pause, listing, resume) = (
            storage.pause_listing.clone(),
            storage.listing.clone(),
            storage.resume.clone(),
        );
        let manager = Arc::new(BasicGoalManager::new(
            storage,
            Arc::new(StaticDecomposer::new(plan())),
            WorkConfig::default(),
        ));
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let (goal_id, first) = (detail.goal.id, detail.actions[0].id);

        pause.store(true, Ordering::SeqCst);
        let reader = tokio::spawn({
            let manager = manager.clone();
            async move { manager.next_steps(goal_id, None).await }
        });
        listing.notified().await;

        let writer = tokio::spawn({
            let manager = manager.clone();
            async move {
                manager
                    .log_event(entry(first, CompletionStatus::Done, None))
                    .await
            }
        });
        tokio::task::yield_now().await;
        resume.notify_one();

        let before = reader.await.unwrap().unwrap();
        assert_eq!(before.iter().map(|s| s.action_id).collect::<Vec<_>>(), vec![first]);
        writer.await.unwrap().unwrap();

        let after = manager.next_steps(goal_id, None).await.unwrap();
        assert_eq!(after.len(), 2);
        assert!(after.iter().all(|s| s.action_id != first));
    }

    #[tokio::test]
    async fn test_failed_action_write_discards_goal() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = ScriptedStorage::new(JsonStorage::new(dir.path()).await.unwrap());
        storage.fail_action_save = Some(2);
        let manager = BasicGoalManager::new(
            storage,
            Arc::new(StaticDecomposer::new(plan())),
            WorkConfig::default(),
        );

        let err = manager.create_goal(GoalSpec::new("g")).await.unwrap_err();
        assert!(matches!(err, WorkError::Storage(_)));
        assert!(manager.list_goals().await.unwrap().is_empty());

        let reopened = JsonStorage::new(dir.path()).await.unwrap();
        let leftovers = reopened.list_actions(&ActionFilter::default()).await.unwrap();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_statistics_with_unbounded_window() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let config = WorkConfig {
            stats_window_days: i64::MAX,
            ..Default::default()
        };
        let manager =
            BasicGoalManager::new(storage, Arc::new(StaticDecomposer::new(plan())), config);
        let detail = manager.create_goal(GoalSpec::new("g")).await.unwrap();
        let action = detail.actions[0].id;

        for _ in 0..3 {
            manager
                .log_event(entry(action, CompletionStatus::Failed, Some("energy")))
                .await
                .unwrap();
        }

        let summary = manager.summary().await.unwrap();
        assert_eq!(summary.failure_reasons.get("energy"), Some(&3));
        let report = manager.parasitic().await.unwrap();
        assert_eq!(report.negative_utility_actions.len(), 1);
    }
}
