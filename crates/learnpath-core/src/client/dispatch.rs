//! One dispatcher per mutation kind.
//!
//! `begin_*` validates the input, applies the optimistic write and returns
//! the [`PendingMutation`]; nothing touches the cache if validation fails.
//! The async methods without the prefix chain `begin_*` and `commit`.

use chrono::Utc;

use super::mutation::{MutationError, MutationKind, MutationOutput, PendingMutation, Request};
use super::SyncClient;
use crate::model::ids::provisional_id;
use crate::model::{
    RoadmapCreate, RoadmapDetail, RoadmapSummary, RoadmapUpdate, Task, TaskCreate, TaskStatus,
    TaskUpdate, Topic, TopicCreate, TopicUpdate,
};
use crate::patch::{
    add_roadmap, add_task, add_topic, next_sort_order, patch_roadmap, patch_roadmap_detail,
    patch_task, patch_topic, remove_roadmap, remove_task, remove_topic,
};
use crate::store::{CacheKey, CacheValue};
use crate::validate::{
    DEFAULT_COLOR, ValidationError, normalize_optional, validate_color, validate_title,
};

/// Lift a detail-tree patch to a cache-value patch.
fn on_detail<F>(f: F) -> impl FnOnce(Option<&CacheValue>) -> Option<CacheValue>
where
    F: FnOnce(Option<&RoadmapDetail>) -> Option<RoadmapDetail>,
{
    move |current| f(current.and_then(CacheValue::as_roadmap)).map(CacheValue::from)
}

/// Lift a roadmap-list patch to a cache-value patch.
fn on_list<F>(f: F) -> impl FnOnce(Option<&CacheValue>) -> Option<CacheValue>
where
    F: FnOnce(Option<&[RoadmapSummary]>) -> Option<Vec<RoadmapSummary>>,
{
    move |current| f(current.and_then(CacheValue::as_roadmaps)).map(CacheValue::from)
}

/// Keys refreshed after a task or topic mutation in `roadmap_id`.
fn tree_settle_keys(roadmap_id: &str, kind: MutationKind) -> Vec<CacheKey> {
    let mut keys = vec![CacheKey::roadmap(roadmap_id)];
    if kind.changes_counts() {
        keys.push(CacheKey::Roadmaps);
        keys.push(CacheKey::Dashboard);
    }
    keys
}

impl SyncClient {
    fn title(&self, raw: &str) -> Result<String, ValidationError> {
        validate_title("title", raw, self.config().max_title_len)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Insert a provisional `not_started` task at the end of `topic_id`.
    pub fn begin_create_task(
        &self,
        roadmap_id: &str,
        topic_id: &str,
        title: &str,
        notes: Option<&str>,
    ) -> Result<PendingMutation, ValidationError> {
        let body = TaskCreate {
            title: self.title(title)?,
            notes: normalize_optional(notes),
        };
        let key = CacheKey::roadmap(roadmap_id);
        let temp_id = provisional_id();
        let now = Utc::now();
        let kind = MutationKind::CreateTask;

        let task = Task {
            id: temp_id.clone(),
            topic_id: topic_id.to_string(),
            title: body.title.clone(),
            notes: body.notes.clone(),
            status: TaskStatus::NotStarted,
            sort_order: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut pending = PendingMutation::new(
            self,
            kind,
            Request::CreateTask {
                topic_id: topic_id.to_string(),
                body,
            },
            tree_settle_keys(roadmap_id, kind),
        );
        pending.apply(
            key.clone(),
            on_detail(|tree| {
                let siblings = tree
                    .and_then(|t| t.topic(topic_id))
                    .map(|t| t.tasks.iter().map(|task| task.sort_order).collect::<Vec<_>>())
                    .unwrap_or_default();
                let task = Task {
                    sort_order: next_sort_order(siblings),
                    ..task
                };
                add_task(tree, topic_id, task)
            }),
        );
        pending.track_submitting(key.clone());
        pending.with_provisional(temp_id, key);
        Ok(pending.applied())
    }

    /// Merge `update` into a task.
    ///
    /// Blank notes mean "leave unchanged". An update carrying a status is
    /// dispatched as a status change and refreshes the dashboard on settle.
    pub fn begin_update_task(
        &self,
        roadmap_id: &str,
        task_id: &str,
        update: TaskUpdate,
    ) -> Result<PendingMutation, ValidationError> {
        let body = TaskUpdate {
            title: update.title.as_deref().map(|t| self.title(t)).transpose()?,
            notes: normalize_optional(update.notes.as_deref()),
            status: update.status,
        };
        let kind = if body.touches_status() {
            MutationKind::UpdateTaskStatus
        } else {
            MutationKind::UpdateTask
        };
        let now = Utc::now();

        let mut pending = PendingMutation::new(
            self,
            kind,
            Request::UpdateTask {
                task_id: task_id.to_string(),
                body: body.clone(),
            },
            tree_settle_keys(roadmap_id, kind),
        );
        pending.apply(
            CacheKey::roadmap(roadmap_id),
            on_detail(|tree| patch_task(tree, task_id, &body, now)),
        );
        Ok(pending.applied())
    }

    /// Set a task's status directly.
    pub fn begin_set_task_status(
        &self,
        roadmap_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<PendingMutation, ValidationError> {
        self.begin_update_task(roadmap_id, task_id, TaskUpdate::status(status))
    }

    /// Move a task one step along `not_started -> in_progress -> completed ->
    /// not_started`.
    ///
    /// The current status is read from the cache at call time, so it already
    /// reflects any earlier optimistic advance that has not resolved yet.
    pub fn begin_advance_task_status(
        &self,
        roadmap_id: &str,
        task_id: &str,
    ) -> Result<PendingMutation, ValidationError> {
        let current = self
            .roadmap(roadmap_id)
            .and_then(|tree| tree.task(task_id).map(|t| t.status))
            .ok_or_else(|| ValidationError::NotCached {
                entity: "task",
                id: task_id.to_string(),
                roadmap_id: roadmap_id.to_string(),
            })?;
        self.begin_set_task_status(roadmap_id, task_id, current.next())
    }

    pub fn begin_delete_task(&self, roadmap_id: &str, task_id: &str) -> PendingMutation {
        let kind = MutationKind::DeleteTask;
        let mut pending = PendingMutation::new(
            self,
            kind,
            Request::DeleteTask {
                task_id: task_id.to_string(),
            },
            tree_settle_keys(roadmap_id, kind),
        );
        pending.apply(
            CacheKey::roadmap(roadmap_id),
            on_detail(|tree| remove_task(tree, task_id)),
        );
        pending.applied()
    }

    // -----------------------------------------------------------------------
    // Topics
    // -----------------------------------------------------------------------

    /// Insert a provisional, empty topic at the end of the roadmap.
    pub fn begin_create_topic(
        &self,
        roadmap_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<PendingMutation, ValidationError> {
        let body = TopicCreate {
            title: self.title(title)?,
            description: normalize_optional(description),
        };
        let key = CacheKey::roadmap(roadmap_id);
        let temp_id = provisional_id();
        let now = Utc::now();
        let kind = MutationKind::CreateTopic;

        let topic = Topic {
            id: temp_id.clone(),
            roadmap_id: roadmap_id.to_string(),
            title: body.title.clone(),
            description: body.description.clone(),
            sort_order: 0,
            tasks: Vec::new(),
            total_tasks: 0,
            completed_tasks: 0,
            progress_percent: 0.0,
            created_at: now,
            updated_at: now,
        };

        let mut pending = PendingMutation::new(
            self,
            kind,
            Request::CreateTopic {
                roadmap_id: roadmap_id.to_string(),
                body,
            },
            tree_settle_keys(roadmap_id, kind),
        );
        pending.apply(
            key.clone(),
            on_detail(|tree| {
                let siblings: Vec<_> = tree
                    .map(|t| t.topics.iter().map(|topic| topic.sort_order).collect())
                    .unwrap_or_default();
                let topic = Topic {
                    sort_order: next_sort_order(siblings),
                    ..topic
                };
                add_topic(tree, topic)
            }),
        );
        pending.track_submitting(key.clone());
        pending.with_provisional(temp_id, key);
        Ok(pending.applied())
    }

    pub fn begin_update_topic(
        &self,
        roadmap_id: &str,
        topic_id: &str,
        update: TopicUpdate,
    ) -> Result<PendingMutation, ValidationError> {
        let body = TopicUpdate {
            title: update.title.as_deref().map(|t| self.title(t)).transpose()?,
            description: normalize_optional(update.description.as_deref()),
        };
        let kind = MutationKind::UpdateTopic;
        let mut pending = PendingMutation::new(
            self,
            kind,
            Request::UpdateTopic {
                topic_id: topic_id.to_string(),
                body: body.clone(),
            },
            tree_settle_keys(roadmap_id, kind),
        );
        pending.apply(
            CacheKey::roadmap(roadmap_id),
            on_detail(|tree| patch_topic(tree, topic_id, &body)),
        );
        Ok(pending.applied())
    }

    /// Remove a topic and all of its tasks.
    pub fn begin_delete_topic(&self, roadmap_id: &str, topic_id: &str) -> PendingMutation {
        let kind = MutationKind::DeleteTopic;
        let mut pending = PendingMutation::new(
            self,
            kind,
            Request::DeleteTopic {
                topic_id: topic_id.to_string(),
            },
            tree_settle_keys(roadmap_id, kind),
        );
        pending.apply(
            CacheKey::roadmap(roadmap_id),
            on_detail(|tree| remove_topic(tree, topic_id)),
        );
        pending.applied()
    }

    // -----------------------------------------------------------------------
    // Roadmaps
    // -----------------------------------------------------------------------

    /// Append a provisional, empty roadmap row to the list.
    pub fn begin_create_roadmap(
        &self,
        title: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<PendingMutation, ValidationError> {
        let body = RoadmapCreate {
            title: self.title(title)?,
            description: normalize_optional(description),
            color: color.map(validate_color).transpose()?,
        };
        let temp_id = provisional_id();
        let now = Utc::now();

        let row = RoadmapSummary {
            id: temp_id.clone(),
            title: body.title.clone(),
            description: body.description.clone(),
            color: body
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            sort_order: 0,
            is_archived: false,
            total_tasks: 0,
            completed_tasks: 0,
            in_progress_tasks: 0,
            progress_percent: 0.0,
            created_at: now,
            updated_at: now,
        };

        let mut pending = PendingMutation::new(
            self,
            MutationKind::CreateRoadmap,
            Request::CreateRoadmap { body },
            vec![CacheKey::Roadmaps, CacheKey::Dashboard],
        );
        pending.apply(
            CacheKey::Roadmaps,
            on_list(|list| {
                let siblings: Vec<_> = list
                    .map(|rows| rows.iter().map(|r| r.sort_order).collect())
                    .unwrap_or_default();
                let row = RoadmapSummary {
                    sort_order: next_sort_order(siblings),
                    ..row
                };
                add_roadmap(list, row)
            }),
        );
        pending.track_submitting(CacheKey::Roadmaps);
        pending.with_provisional(temp_id, CacheKey::Roadmaps);
        Ok(pending.applied())
    }

    /// Patch the list row and, when cached, the detail tree.
    pub fn begin_update_roadmap(
        &self,
        roadmap_id: &str,
        update: RoadmapUpdate,
    ) -> Result<PendingMutation, ValidationError> {
        let body = RoadmapUpdate {
            title: update.title.as_deref().map(|t| self.title(t)).transpose()?,
            description: normalize_optional(update.description.as_deref()),
            color: update.color.as_deref().map(validate_color).transpose()?,
            is_archived: update.is_archived,
        };
        let detail_key = CacheKey::roadmap(roadmap_id);
        let mut pending = PendingMutation::new(
            self,
            MutationKind::UpdateRoadmap,
            Request::UpdateRoadmap {
                roadmap_id: roadmap_id.to_string(),
                body: body.clone(),
            },
            vec![CacheKey::Roadmaps, detail_key.clone()],
        );
        pending.apply(
            CacheKey::Roadmaps,
            on_list(|list| patch_roadmap(list, roadmap_id, &body)),
        );
        pending.apply(
            detail_key,
            on_detail(|tree| patch_roadmap_detail(tree, &body)),
        );
        Ok(pending.applied())
    }

    /// Remove the list row; the detail key is dropped once confirmed.
    pub fn begin_delete_roadmap(&self, roadmap_id: &str) -> PendingMutation {
        let mut pending = PendingMutation::new(
            self,
            MutationKind::DeleteRoadmap,
            Request::DeleteRoadmap {
                roadmap_id: roadmap_id.to_string(),
            },
            vec![CacheKey::Roadmaps, CacheKey::Dashboard],
        );
        pending.apply(
            CacheKey::Roadmaps,
            on_list(|list| remove_roadmap(list, roadmap_id)),
        );
        pending.evict_on_confirm(CacheKey::roadmap(roadmap_id));
        pending.applied()
    }

    // -----------------------------------------------------------------------
    // Dispatch and commit in one step
    // -----------------------------------------------------------------------

    pub async fn create_task(
        &self,
        roadmap_id: &str,
        topic_id: &str,
        title: &str,
        notes: Option<&str>,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_create_task(roadmap_id, topic_id, title, notes)?
            .commit()
            .await
    }

    pub async fn update_task(
        &self,
        roadmap_id: &str,
        task_id: &str,
        update: TaskUpdate,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_update_task(roadmap_id, task_id, update)?
            .commit()
            .await
    }

    pub async fn set_task_status(
        &self,
        roadmap_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_set_task_status(roadmap_id, task_id, status)?
            .commit()
            .await
    }

    pub async fn advance_task_status(
        &self,
        roadmap_id: &str,
        task_id: &str,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_advance_task_status(roadmap_id, task_id)?
            .commit()
            .await
    }

    pub async fn delete_task(
        &self,
        roadmap_id: &str,
        task_id: &str,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_delete_task(roadmap_id, task_id).commit().await
    }

    pub async fn create_topic(
        &self,
        roadmap_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_create_topic(roadmap_id, title, description)?
            .commit()
            .await
    }

    pub async fn update_topic(
        &self,
        roadmap_id: &str,
        topic_id: &str,
        update: TopicUpdate,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_update_topic(roadmap_id, topic_id, update)?
            .commit()
            .await
    }

    pub async fn delete_topic(
        &self,
        roadmap_id: &str,
        topic_id: &str,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_delete_topic(roadmap_id, topic_id).commit().await
    }

    pub async fn create_roadmap(
        &self,
        title: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_create_roadmap(title, description, color)?
            .commit()
            .await
    }

    pub async fn update_roadmap(
        &self,
        roadmap_id: &str,
        update: RoadmapUpdate,
    ) -> Result<MutationOutput, MutationError> {
        self.begin_update_roadmap(roadmap_id, update)?
            .commit()
            .await
    }

    pub async fn delete_roadmap(&self, roadmap_id: &str) -> Result<MutationOutput, MutationError> {
        self.begin_delete_roadmap(roadmap_id).commit().await
    }
}
