//! Request bodies for the create/update endpoints.
//!
//! Update payloads are partial: `None` fields are left out of the JSON body
//! and the server leaves them unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{RoadmapDetail, RoadmapSummary, Task, Topic};
use super::status::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoadmapCreate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoadmapUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl RoadmapUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.is_archived.is_none()
    }

    /// Merge into a list row.
    #[must_use]
    pub fn applied_to_summary(&self, row: &RoadmapSummary) -> RoadmapSummary {
        let mut next = row.clone();
        if let Some(title) = &self.title {
            next.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(color) = &self.color {
            next.color.clone_from(color);
        }
        if let Some(archived) = self.is_archived {
            next.is_archived = archived;
        }
        next
    }

    /// Merge the scalar fields into a detail tree; topics are untouched.
    #[must_use]
    pub fn applied_to_detail(&self, detail: &RoadmapDetail) -> RoadmapDetail {
        let mut next = detail.with_topics(detail.topics.clone());
        if let Some(title) = &self.title {
            next.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(color) = &self.color {
            next.color.clone_from(color);
        }
        if let Some(archived) = self.is_archived {
            next.is_archived = archived;
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicCreate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TopicUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }

    #[must_use]
    pub fn applied_to(&self, topic: &Topic) -> Topic {
        let mut next = topic.with_tasks(topic.tasks.clone());
        if let Some(title) = &self.title {
            next.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial task update; also the field set merged by optimistic patches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_none() && self.status.is_none()
    }

    /// Whether applying this update can move completion counts.
    #[must_use]
    pub const fn touches_status(&self) -> bool {
        self.status.is_some()
    }

    /// Merge into `task` for optimistic display.
    ///
    /// A status change also mirrors the server's `completed_at` rule so the
    /// provisional view shows a completion date; the refetch replaces it with
    /// the server's value.
    #[must_use]
    pub fn applied_to(&self, task: &Task, now: DateTime<Utc>) -> Task {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            next.title.clone_from(title);
        }
        if let Some(notes) = &self.notes {
            next.notes = Some(notes.clone());
        }
        if let Some(status) = self.status {
            if status != task.status {
                next.completed_at = status.is_completed().then_some(now);
            }
            next.status = status;
        }
        next
    }
}
