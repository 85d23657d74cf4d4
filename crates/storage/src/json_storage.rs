//! JSON file storage implementation.
//!
//! Stores one pretty-printed JSON file per record in a `.chance` directory
//! and keeps per-kind id counters in `meta/counters.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use chance_core::{Action, ActionId, Breakpoint, CompletionEvent, Goal, GoalId};
use super::{
    ActionFilter, BreakpointFilter, EntityKind, EventFilter, Result, Storage, StorageError,
};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    pending: Arc<Mutex<bool>>,
}

impl JsonStorage {
    /// Create storage, creating the record and meta directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for kind in [
            EntityKind::Goal,
            EntityKind::Action,
            EntityKind::Event,
            EntityKind::Breakpoint,
        ] {
            fs::create_dir_all(root.join(kind.as_str())).await?;
        }
        fs::create_dir_all(root.join("meta")).await?;

        Ok(Self {
            root,
            pending: Arc::new(Mutex::new(false)),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether writes happened since the last commit or rollback.
    pub async fn has_pending(&self) -> bool {
        *self.pending.lock().await
    }

    fn record_path(&self, kind: EntityKind, id: u64) -> PathBuf {
        self.root.join(kind.as_str()).join(format!("{}.json", id))
    }

    fn counters_path(&self) -> PathBuf {
        self.root.join("meta").join("counters.json")
    }

    async fn set_pending(&self) {
        *self.pending.lock().await = true;
    }

    async fn write_record<T: serde::Serialize>(
        &self,
        kind: EntityKind,
        id: u64,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.record_path(kind, id), json.as_bytes()).await?;
        self.set_pending().await;
        Ok(())
    }

    async fn remove_record(&self, kind: EntityKind, id: u64) -> Result<bool> {
        match fs::remove_file(self.record_path(kind, id)).await {
            Ok(()) => {
                self.set_pending().await;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn allocate_id(&mut self, kind: EntityKind) -> Result<u64> {
        let path = self.counters_path();
        let mut counters: BTreeMap<String, u64> = read_json(&path).await?.unwrap_or_default();

        let next = counters.get(kind.as_str()).copied().unwrap_or(0) + 1;
        counters.insert(kind.as_str().to_string(), next);

        fs::write(&path, serde_json::to_string_pretty(&counters)?.as_bytes()).await?;
        debug!(kind = kind.as_str(), id = next, "allocated id");
        Ok(next)
    }

    async fn save_goal(&mut self, goal: &Goal) -> Result<()> {
        self.write_record(EntityKind::Goal, goal.id.get(), goal).await
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        read_json(&self.record_path(EntityKind::Goal, id.get())).await
    }

    async fn delete_goal(&mut self, id: GoalId) -> Result<()> {
        self.remove_record(EntityKind::Goal, id.get()).await?;
        Ok(())
    }

    async fn list_goals(&self) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = list_dir(&self.root.join(EntityKind::Goal.as_str())).await?;
        goals.sort_by_key(|g| g.id);
        Ok(goals)
    }

    async fn save_action(&mut self, action: &Action) -> Result<()> {
        self.write_record(EntityKind::Action, action.id.get(), action).await
    }

    async fn load_action(&self, id: ActionId) -> Result<Option<Action>> {
        read_json(&self.record_path(EntityKind::Action, id.get())).await
    }

    async fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<Action>> {
        let all: Vec<Action> = list_dir(&self.root.join(EntityKind::Action.as_str())).await?;
        let mut actions: Vec<Action> = all.into_iter().filter(|a| filter.matches(a)).collect();
        actions.sort_by_key(|a| a.id);
        Ok(actions)
    }

    async fn delete_action(&mut self, id: ActionId) -> Result<()> {
        self.remove_record(EntityKind::Action, id.get()).await?;
        Ok(())
    }

    async fn save_event(&mut self, event: &CompletionEvent) -> Result<()> {
        let path = self.record_path(EntityKind::Event, event.id.get());
        if fs::try_exists(&path).await? {
            return Err(StorageError::Other(format!(
                "event {} already exists; events are append-only",
                event.id
            )));
        }
        self.write_record(EntityKind::Event, event.id.get(), event).await
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<CompletionEvent>> {
        let all: Vec<CompletionEvent> =
            list_dir(&self.root.join(EntityKind::Event.as_str())).await?;
        let mut events: Vec<CompletionEvent> =
            all.into_iter().filter(|e| filter.matches(e)).collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn save_breakpoint(&mut self, breakpoint: &Breakpoint) -> Result<()> {
        self.write_record(EntityKind::Breakpoint, breakpoint.id.get(), breakpoint).await
    }

    async fn list_breakpoints(&self, filter: &BreakpointFilter) -> Result<Vec<Breakpoint>> {
        let all: Vec<Breakpoint> =
            list_dir(&self.root.join(EntityKind::Breakpoint.as_str())).await?;
        let mut breakpoints: Vec<Breakpoint> =
            all.into_iter().filter(|b| filter.matches(b)).collect();
        breakpoints.sort_by_key(|b| b.id);
        Ok(breakpoints)
    }

    async fn delete_breakpoints(&mut self, action_id: ActionId) -> Result<usize> {
        let filter = BreakpointFilter {
            action_id: Some(action_id),
            ..Default::default()
        };
        let mut removed = 0;
        for breakpoint in self.list_breakpoints(&filter).await? {
            if self.remove_record(EntityKind::Breakpoint, breakpoint.id.get()).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        // Every write already hit disk; commit only clears the pending marker.
        debug!("commit: {}", message);
        *self.pending.lock().await = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        // Writes are not journaled, so there is nothing to undo here.
        debug!("rollback");
        *self.pending.lock().await = false;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chance_core::{
        ActionStatus, BreakpointId, BreakpointPattern, CompletionStatus, EnergyLevel, EventId,
    };
    use chrono::{Duration, Utc};

    async fn open() -> (tempfile::TempDir, JsonStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_allocate_id_is_monotonic_per_kind() {
        let (_dir, mut storage) = open().await;

        assert_eq!(storage.allocate_id(EntityKind::Goal).await.unwrap(), 1);
        assert_eq!(storage.allocate_id(EntityKind::Goal).await.unwrap(), 2);
        assert_eq!(storage.allocate_id(EntityKind::Action).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_goal_operations() {
        let (_dir, mut storage) = open().await;

        let goal = Goal::new(GoalId::new(1), "Learn Rust");
        storage.save_goal(&goal).await.unwrap();
        assert!(storage.has_pending().await);

        let loaded = storage.load_goal(goal.id).await.unwrap().unwrap();
        assert_eq!(loaded, goal);
        assert!(storage.load_goal(GoalId::new(9)).await.unwrap().is_none());

        storage.commit("add goal").await.unwrap();
        assert!(!storage.has_pending().await);

        storage.delete_goal(goal.id).await.unwrap();
        assert!(storage.list_goals().await.unwrap().is_empty());
        storage.rollback().await.unwrap();
        assert!(!storage.has_pending().await);
    }

    #[tokio::test]
    async fn test_list_actions_filters_by_goal_and_status() {
        let (_dir, mut storage) = open().await;

        for (id, goal, status) in [
            (1, 1, ActionStatus::Pending),
            (2, 1, ActionStatus::Done),
            (3, 2, ActionStatus::Pending),
        ] {
            let action =
                Action::new(ActionId::new(id), GoalId::new(goal), "a", 10, EnergyLevel::Low)
                    .with_status(status);
            storage.save_action(&action).await.unwrap();
        }

        let goal_one = storage.list_actions(&ActionFilter::for_goal(GoalId::new(1))).await.unwrap();
        assert_eq!(goal_one.iter().map(|a| a.id.get()).collect::<Vec<_>>(), vec![1, 2]);

        let pending = storage
            .list_actions(&ActionFilter {
                status: Some(vec![ActionStatus::Pending]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.iter().map(|a| a.id.get()).collect::<Vec<_>>(), vec![1, 3]);

        storage.delete_action(ActionId::new(1)).await.unwrap();
        storage.delete_action(ActionId::new(1)).await.unwrap();
        assert!(storage.load_action(ActionId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_events_are_listed_oldest_first() {
        let (_dir, mut storage) = open().await;
        let now = Utc::now();

        let failed = |id| {
            CompletionEvent::new(
                EventId::new(id),
                ActionId::new(1),
                GoalId::new(1),
                CompletionStatus::Failed,
            )
        };
        let newer = failed(1).at(now);
        let older = failed(2).at(now - Duration::hours(1));
        storage.save_event(&newer).await.unwrap();
        storage.save_event(&older).await.unwrap();

        let events = storage.list_events(&EventFilter::for_action(ActionId::new(1))).await.unwrap();
        assert_eq!(events.iter().map(|e| e.id.get()).collect::<Vec<_>>(), vec![2, 1]);

        let recent = storage
            .list_events(&EventFilter {
                since: Some(now - Duration::minutes(5)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_events_are_append_only() {
        let (_dir, mut storage) = open().await;

        let event = CompletionEvent::new(
            EventId::new(1),
            ActionId::new(1),
            GoalId::new(1),
            CompletionStatus::Done,
        );
        storage.save_event(&event).await.unwrap();
        assert!(storage.save_event(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_breakpoints_for_action() {
        let (_dir, mut storage) = open().await;

        for (id, action) in [(1, 1), (2, 1), (3, 2)] {
            let breakpoint = Breakpoint {
                id: BreakpointId::new(id),
                action_id: ActionId::new(action),
                failure_count: 2,
                pattern: BreakpointPattern::Time,
                reasons: vec![None, Some("late".to_string())],
                detected_at: Utc::now(),
            };
            storage.save_breakpoint(&breakpoint).await.unwrap();
        }

        let removed = storage.delete_breakpoints(ActionId::new(1)).await.unwrap();
        assert_eq!(removed, 2);

        let left = storage.list_breakpoints(&BreakpointFilter::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].action_id, ActionId::new(2));
        assert_eq!(left[0].reasons, vec![None, Some("late".to_string())]);
    }
}
