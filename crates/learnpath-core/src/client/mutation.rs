//! One optimistic mutation, from dispatch to settle.
//!
//! ```text
//! Pending --apply--> OptimisticApplied --commit--> Confirmed
//!                                          \-----> RolledBack
//! ```
//!
//! Applying cancels in-flight fetches for each touched key, snapshots it and
//! writes the optimistic value. Committing sends the request; a failure puts
//! every snapshot back exactly. Either way the settle step then invalidates
//! the affected keys so observed views are refetched.
//!
//! Dropping a mutation that was applied but never committed rolls it back.

use std::fmt;

use tracing::{debug, info, warn};

use super::SyncClient;
use crate::error::ErrorCode;
use crate::model::{
    RoadmapCreate, RoadmapSummary, RoadmapUpdate, Task, TaskCreate, TaskUpdate, Topic,
    TopicCreate, TopicUpdate,
};
use crate::patch::{replace_roadmap, replace_task, replace_topic};
use crate::store::{CacheKey, CacheValue};
use crate::transport::TransportError;
use crate::validate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateTask,
    UpdateTask,
    UpdateTaskStatus,
    DeleteTask,
    CreateTopic,
    UpdateTopic,
    DeleteTopic,
    CreateRoadmap,
    UpdateRoadmap,
    DeleteRoadmap,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::UpdateTaskStatus => "update_task_status",
            Self::DeleteTask => "delete_task",
            Self::CreateTopic => "create_topic",
            Self::UpdateTopic => "update_topic",
            Self::DeleteTopic => "delete_topic",
            Self::CreateRoadmap => "create_roadmap",
            Self::UpdateRoadmap => "update_roadmap",
            Self::DeleteRoadmap => "delete_roadmap",
        }
    }

    #[must_use]
    pub const fn is_create(self) -> bool {
        matches!(
            self,
            Self::CreateTask | Self::CreateTopic | Self::CreateRoadmap
        )
    }

    /// Whether the mutation can move task or roadmap counts.
    #[must_use]
    pub const fn changes_counts(self) -> bool {
        !matches!(
            self,
            Self::UpdateTask | Self::UpdateTopic | Self::UpdateRoadmap
        )
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Pending,
    OptimisticApplied,
    Confirmed,
    RolledBack,
}

/// The network request behind a mutation.
#[derive(Debug, Clone)]
pub(crate) enum Request {
    CreateTask { topic_id: String, body: TaskCreate },
    UpdateTask { task_id: String, body: TaskUpdate },
    DeleteTask { task_id: String },
    CreateTopic { roadmap_id: String, body: TopicCreate },
    UpdateTopic { topic_id: String, body: TopicUpdate },
    DeleteTopic { topic_id: String },
    CreateRoadmap { body: RoadmapCreate },
    UpdateRoadmap { roadmap_id: String, body: RoadmapUpdate },
    DeleteRoadmap { roadmap_id: String },
}

/// What the server returned for a confirmed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutput {
    Task(Task),
    Topic(Topic),
    Roadmap(RoadmapSummary),
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Rejected before dispatch; the cache was not touched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request failed and the optimistic write was rolled back.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl MutationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(err) => err.code(),
            Self::Transport(err) => err.code(),
        }
    }

    #[must_use]
    pub const fn is_rolled_back(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// An optimistic write that has been applied locally and awaits its request.
#[must_use = "an uncommitted mutation is rolled back when dropped"]
pub struct PendingMutation {
    client: SyncClient,
    id: u64,
    kind: MutationKind,
    phase: MutationPhase,
    request: Request,
    snapshots: Vec<(CacheKey, Option<CacheValue>)>,
    settle_keys: Vec<CacheKey>,
    evict_on_confirm: Option<CacheKey>,
    submitting: Option<CacheKey>,
    provisional: Option<(String, CacheKey)>,
}

impl fmt::Debug for PendingMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingMutation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .field("provisional", &self.provisional)
            .finish_non_exhaustive()
    }
}

impl PendingMutation {
    pub(crate) fn new(
        client: &SyncClient,
        kind: MutationKind,
        request: Request,
        settle_keys: Vec<CacheKey>,
    ) -> Self {
        Self {
            client: client.clone(),
            id: client.next_mutation_id(),
            kind,
            phase: MutationPhase::Pending,
            request,
            snapshots: Vec::new(),
            settle_keys,
            evict_on_confirm: None,
            submitting: None,
            provisional: None,
        }
    }

    /// Cancel fetches for `key`, snapshot it and write `patch`'s result.
    ///
    /// A key with nothing cached is skipped: there is nothing to patch and
    /// nothing to restore.
    pub(crate) fn apply<F>(&mut self, key: CacheKey, patch: F)
    where
        F: FnOnce(Option<&CacheValue>) -> Option<CacheValue>,
    {
        let store = self.client.store();
        if store.get(&key).is_none() {
            debug!(mutation = self.id, key = %key, "key not cached; optimistic write skipped");
            return;
        }
        if store.cancel_in_flight(&key) {
            debug!(mutation = self.id, key = %key, "cancelled in-flight fetch");
        }
        let mut wrote = false;
        let snapshot = store.replace_with(&key, |current| {
            let next = patch(current);
            wrote = next.is_some();
            next
        });
        if wrote {
            self.snapshots.push((key, snapshot));
        }
    }

    pub(crate) fn track_submitting(&mut self, key: CacheKey) {
        self.client.mark_submitting(&key);
        self.submitting = Some(key);
    }

    /// Replace the provisional entity under `key` with the server's on confirm.
    pub(crate) fn with_provisional(&mut self, id: String, key: CacheKey) {
        self.provisional = Some((id, key));
    }

    pub(crate) fn evict_on_confirm(&mut self, key: CacheKey) {
        self.evict_on_confirm = Some(key);
    }

    pub(crate) fn applied(mut self) -> Self {
        self.phase = MutationPhase::OptimisticApplied;
        debug!(
            mutation = self.id,
            kind = self.kind.as_str(),
            keys = self.snapshots.len(),
            "optimistic write applied"
        );
        self
    }

    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        self.kind
    }

    #[must_use]
    pub const fn phase(&self) -> MutationPhase {
        self.phase
    }

    /// Temporary id of the entity a create mutation inserted.
    #[must_use]
    pub fn provisional_id(&self) -> Option<&str> {
        self.provisional.as_ref().map(|(id, _)| id.as_str())
    }

    /// Send the request, then confirm or roll back, then settle.
    pub async fn commit(mut self) -> Result<MutationOutput, MutationError> {
        let outcome = self.send().await;
        match &outcome {
            Ok(output) => {
                self.phase = MutationPhase::Confirmed;
                self.reconcile(output);
                if let Some(key) = self.evict_on_confirm.take() {
                    self.client.store().evict(&key);
                }
                info!(mutation = self.id, kind = self.kind.as_str(), "mutation confirmed");
            }
            Err(err) => {
                self.rollback();
                warn!(
                    mutation = self.id,
                    kind = self.kind.as_str(),
                    error = %err,
                    "mutation failed; rolled back"
                );
            }
        }
        self.finish();
        outcome.map_err(MutationError::from)
    }

    async fn send(&self) -> Result<MutationOutput, TransportError> {
        let transport = self.client.transport();
        match &self.request {
            Request::CreateTask { topic_id, body } => transport
                .create_task(topic_id, body)
                .await
                .map(MutationOutput::Task),
            Request::UpdateTask { task_id, body } => transport
                .update_task(task_id, body)
                .await
                .map(MutationOutput::Task),
            Request::DeleteTask { task_id } => transport
                .delete_task(task_id)
                .await
                .map(|()| MutationOutput::Deleted),
            Request::CreateTopic { roadmap_id, body } => transport
                .create_topic(roadmap_id, body)
                .await
                .map(MutationOutput::Topic),
            Request::UpdateTopic { topic_id, body } => transport
                .update_topic(topic_id, body)
                .await
                .map(MutationOutput::Topic),
            Request::DeleteTopic { topic_id } => transport
                .delete_topic(topic_id)
                .await
                .map(|()| MutationOutput::Deleted),
            Request::CreateRoadmap { body } => transport
                .create_roadmap(body)
                .await
                .map(MutationOutput::Roadmap),
            Request::UpdateRoadmap { roadmap_id, body } => transport
                .update_roadmap(roadmap_id, body)
                .await
                .map(MutationOutput::Roadmap),
            Request::DeleteRoadmap { roadmap_id } => transport
                .delete_roadmap(roadmap_id)
                .await
                .map(|()| MutationOutput::Deleted),
        }
    }

    /// Swap a provisional entity for the server-created one, wholesale.
    fn reconcile(&self, output: &MutationOutput) {
        let Some((temp_id, key)) = &self.provisional else {
            return;
        };
        let store = self.client.store();
        match output {
            MutationOutput::Task(task) => {
                store.replace_with(key, |current| {
                    replace_task(current.and_then(CacheValue::as_roadmap), temp_id, task)
                        .map(CacheValue::from)
                });
            }
            MutationOutput::Topic(topic) => {
                store.replace_with(key, |current| {
                    replace_topic(current.and_then(CacheValue::as_roadmap), temp_id, topic)
                        .map(CacheValue::from)
                });
            }
            MutationOutput::Roadmap(row) => {
                store.replace_with(key, |current| {
                    replace_roadmap(current.and_then(CacheValue::as_roadmaps), temp_id, row)
                        .map(CacheValue::from)
                });
            }
            MutationOutput::Deleted => {}
        }
    }

    fn rollback(&mut self) {
        let store = self.client.store();
        for (key, snapshot) in self.snapshots.drain(..).rev() {
            store.restore(&key, snapshot);
        }
        self.phase = MutationPhase::RolledBack;
    }

    /// Clear submission state and invalidate every affected key.
    fn finish(&mut self) {
        if let Some(key) = self.submitting.take() {
            self.client.clear_submitting(&key);
        }
        for key in &self.settle_keys {
            self.client.invalidate(key);
        }
        debug!(
            mutation = self.id,
            phase = ?self.phase,
            keys = self.settle_keys.len(),
            "mutation settled"
        );
        self.settle_keys.clear();
    }
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        if self.phase != MutationPhase::OptimisticApplied {
            return;
        }
        warn!(
            mutation = self.id,
            kind = self.kind.as_str(),
            "mutation dropped before it settled; rolling back"
        );
        self.rollback();
        self.finish();
    }
}
