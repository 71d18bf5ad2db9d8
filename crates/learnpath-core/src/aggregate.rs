//! Derived counters for topics and roadmaps.
//!
//! Both recomputations are pure and idempotent: they read only the child
//! task lists and overwrite the aggregate fields, leaving every other field
//! as it was. Roadmap totals are tallied from the tasks themselves, never from
//! the (possibly stale) topic aggregates.

use crate::model::{RoadmapDetail, Task, TaskStatus, Topic};

/// Status tally over a set of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
}

impl TaskCounts {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut acc, task| {
            acc.total = acc.total.saturating_add(1);
            match task.status {
                TaskStatus::Completed => acc.completed = acc.completed.saturating_add(1),
                TaskStatus::InProgress => acc.in_progress = acc.in_progress.saturating_add(1),
                TaskStatus::NotStarted => {}
            }
            acc
        })
    }

    #[must_use]
    pub fn percent(self) -> f64 {
        progress_percent(self.completed, self.total)
    }
}

/// `completed / total * 100`, exactly `0.0` when `total` is zero, clamped to
/// `[0, 100]`.
#[must_use]
pub fn progress_percent(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(completed) / f64::from(total) * 100.0).clamp(0.0, 100.0)
}

/// Recompute `total_tasks`, `completed_tasks` and `progress_percent` from
/// `topic.tasks`.
#[must_use]
pub fn recalc_topic(mut topic: Topic) -> Topic {
    let counts = TaskCounts::tally(&topic.tasks);
    topic.total_tasks = counts.total;
    topic.completed_tasks = counts.completed;
    topic.progress_percent = counts.percent();
    topic
}

/// Recompute the roadmap counters by flattening every topic's tasks.
#[must_use]
pub fn recalc_roadmap(mut roadmap: RoadmapDetail) -> RoadmapDetail {
    let counts = TaskCounts::tally(roadmap.tasks());
    roadmap.total_tasks = counts.total;
    roadmap.completed_tasks = counts.completed;
    roadmap.in_progress_tasks = counts.in_progress;
    roadmap.progress_percent = counts.percent();
    roadmap
}

/// Recompute every topic and then the roadmap.
#[must_use]
pub fn recalc_tree(mut roadmap: RoadmapDetail) -> RoadmapDetail {
    roadmap.topics = std::mem::take(&mut roadmap.topics)
        .into_iter()
        .map(recalc_topic)
        .collect();
    recalc_roadmap(roadmap)
}
