//! Local edit buffer for the full task form.
//!
//! A draft is opened from a cached task and turned into a partial
//! [`TaskUpdate`] holding only what changed. If the task disappears from the
//! cache before the draft is saved (it was deleted), the draft is dropped:
//! delete wins.

use crate::client::{MutationError, MutationOutput, SyncClient};
use crate::model::{Task, TaskStatus, TaskUpdate};
use crate::validate::{ValidationError, validate_title};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    roadmap_id: String,
    task_id: String,
    original: Task,
    pub title: String,
    pub notes: String,
    pub status: TaskStatus,
}

impl TaskDraft {
    #[must_use]
    pub fn open(roadmap_id: &str, task: &Task) -> Self {
        Self {
            roadmap_id: roadmap_id.to_string(),
            task_id: task.id.clone(),
            original: task.clone(),
            title: task.title.clone(),
            notes: task.notes.clone().unwrap_or_default(),
            status: task.status,
        }
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    #[must_use]
    pub fn roadmap_id(&self) -> &str {
        &self.roadmap_id
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> &mut Self {
        self.notes = notes.into();
        self
    }

    /// Any of the three statuses may be picked directly here.
    pub fn set_status(&mut self, status: TaskStatus) -> &mut Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.title.trim() != self.original.title
            || self.changed_notes().is_some()
            || self.status != self.original.status
    }

    fn changed_notes(&self) -> Option<String> {
        let notes = self.notes.trim();
        (!notes.is_empty() && Some(notes) != self.original.notes.as_deref())
            .then(|| notes.to_string())
    }

    /// The fields that differ from the task the draft was opened from.
    ///
    /// The title is required; notes left blank are not sent.
    pub fn to_update(&self, max_title_len: usize) -> Result<TaskUpdate, ValidationError> {
        let title = validate_title("title", &self.title, max_title_len)?;
        Ok(TaskUpdate {
            title: (title != self.original.title).then_some(title),
            notes: self.changed_notes(),
            status: (self.status != self.original.status).then_some(self.status),
        })
    }
}

impl SyncClient {
    /// Save a draft through the update-task mutation.
    ///
    /// Returns `Ok(None)` without dispatching when the task is no longer
    /// cached or nothing changed.
    pub async fn save_draft(
        &self,
        draft: &TaskDraft,
    ) -> Result<Option<MutationOutput>, MutationError> {
        let still_cached = self
            .roadmap(draft.roadmap_id())
            .is_some_and(|tree| tree.task(draft.task_id()).is_some());
        if !still_cached {
            tracing::debug!(task = draft.task_id(), "task gone; draft discarded");
            return Ok(None);
        }
        let update = draft.to_update(self.config().max_title_len)?;
        if update.is_empty() {
            return Ok(None);
        }
        self.update_task(draft.roadmap_id(), draft.task_id(), update)
            .await
            .map(Some)
    }
}
