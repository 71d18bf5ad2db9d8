//! Roadmap, topic and task records as the backend serves them.
//!
//! Aggregate fields (`total_tasks`, `completed_tasks`, `in_progress_tasks`,
//! `progress_percent`) are carried on the records but are always derived by
//! [`crate::aggregate`] after a tree changes; nothing in the client writes
//! them by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

/// Atomic unit of work inside a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Back-reference to the owning topic.
    pub topic_id: String,
    pub title: String,
    /// Free-form markdown notes.
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub sort_order: i64,
    /// Server-owned: set when the task becomes `completed`, cleared otherwise.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Named grouping of tasks within a roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    /// Back-reference to the owning roadmap.
    pub roadmap_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Copy every field except the task list, which is replaced by `tasks`.
    ///
    /// Aggregates are copied as-is; callers recompute them.
    #[must_use]
    pub fn with_tasks(&self, tasks: Vec<Task>) -> Self {
        Self {
            id: self.id.clone(),
            roadmap_id: self.roadmap_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            sort_order: self.sort_order,
            tasks,
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            progress_percent: self.progress_percent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// Roadmap row as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display accent; opaque to the cache logic.
    pub color: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub in_progress_tasks: u32,
    #[serde(default)]
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Roadmap with its nested topic/task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub color: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    // The detail endpoint does not always send this one.
    #[serde(default)]
    pub in_progress_tasks: u32,
    #[serde(default)]
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoadmapDetail {
    /// Copy every field except the topic list, which is replaced by `topics`.
    #[must_use]
    pub fn with_topics(&self, topics: Vec<Topic>) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
            sort_order: self.sort_order,
            is_archived: self.is_archived,
            topics,
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            in_progress_tasks: self.in_progress_tasks,
            progress_percent: self.progress_percent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// Find a task anywhere in the tree.
    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.topics.iter().find_map(|t| t.task(task_id))
    }

    /// Iterate every task across all topics, in display order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.topics.iter().flat_map(|t| t.tasks.iter())
    }

    /// The list-row projection of this roadmap.
    #[must_use]
    pub fn summary(&self) -> RoadmapSummary {
        RoadmapSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
            sort_order: self.sort_order,
            is_archived: self.is_archived,
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            in_progress_tasks: self.in_progress_tasks,
            progress_percent: self.progress_percent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
