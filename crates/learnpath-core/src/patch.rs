//! Pure cache patch functions.
//!
//! Every function takes the cached value by reference (or `None` when the key
//! has not been loaded yet) and returns a fresh value with aggregates
//! recomputed. Inputs are never mutated. A patch on a missing cache is a
//! no-op returning `None`, and an id lookup miss returns the tree unchanged:
//! overlapping optimistic writes and settle refetches race, and a patch
//! aimed at something a refetch already removed must be harmless.

use chrono::{DateTime, Utc};

use crate::aggregate::{recalc_roadmap, recalc_topic, recalc_tree};
use crate::model::{
    RoadmapDetail, RoadmapSummary, RoadmapUpdate, Task, TaskUpdate, Topic, TopicUpdate,
};

// ---------------------------------------------------------------------------
// Roadmap detail tree
// ---------------------------------------------------------------------------

/// Merge `update` into the task with `task_id`, wherever it lives.
#[must_use]
pub fn patch_task(
    tree: Option<&RoadmapDetail>,
    task_id: &str,
    update: &TaskUpdate,
    now: DateTime<Utc>,
) -> Option<RoadmapDetail> {
    let tree = tree?;
    if tree.task(task_id).is_none() {
        return Some(tree.clone());
    }
    let topics = tree
        .topics
        .iter()
        .map(|topic| {
            if topic.task(task_id).is_none() {
                return topic.clone();
            }
            let tasks = topic
                .tasks
                .iter()
                .map(|t| {
                    if t.id == task_id {
                        update.applied_to(t, now)
                    } else {
                        t.clone()
                    }
                })
                .collect();
            recalc_topic(topic.with_tasks(tasks))
        })
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Drop the task with `task_id` from its topic.
#[must_use]
pub fn remove_task(tree: Option<&RoadmapDetail>, task_id: &str) -> Option<RoadmapDetail> {
    let tree = tree?;
    if tree.task(task_id).is_none() {
        return Some(tree.clone());
    }
    let topics = tree
        .topics
        .iter()
        .map(|topic| {
            if topic.task(task_id).is_none() {
                return topic.clone();
            }
            let tasks = topic
                .tasks
                .iter()
                .filter(|t| t.id != task_id)
                .cloned()
                .collect();
            recalc_topic(topic.with_tasks(tasks))
        })
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Append `task` to the topic with `topic_id`.
#[must_use]
pub fn add_task(tree: Option<&RoadmapDetail>, topic_id: &str, task: Task) -> Option<RoadmapDetail> {
    let tree = tree?;
    if tree.topic(topic_id).is_none() {
        return Some(tree.clone());
    }
    let topics = tree
        .topics
        .iter()
        .map(|topic| {
            if topic.id != topic_id {
                return topic.clone();
            }
            let mut tasks = topic.tasks.clone();
            tasks.push(task.clone());
            recalc_topic(topic.with_tasks(tasks))
        })
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Swap the task with `old_id` for `task`, keeping its position.
///
/// Used to replace a provisional task with the one the server created.
#[must_use]
pub fn replace_task(tree: Option<&RoadmapDetail>, old_id: &str, task: &Task) -> Option<RoadmapDetail> {
    let tree = tree?;
    if tree.task(old_id).is_none() {
        return Some(tree.clone());
    }
    let topics = tree
        .topics
        .iter()
        .map(|topic| {
            if topic.task(old_id).is_none() {
                return topic.clone();
            }
            let tasks = topic
                .tasks
                .iter()
                .map(|t| if t.id == old_id { task.clone() } else { t.clone() })
                .collect();
            recalc_topic(topic.with_tasks(tasks))
        })
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Drop the topic with `topic_id` and all of its tasks.
#[must_use]
pub fn remove_topic(tree: Option<&RoadmapDetail>, topic_id: &str) -> Option<RoadmapDetail> {
    let tree = tree?;
    if tree.topic(topic_id).is_none() {
        return Some(tree.clone());
    }
    let topics = tree
        .topics
        .iter()
        .filter(|t| t.id != topic_id)
        .cloned()
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Append `topic` to the roadmap.
#[must_use]
pub fn add_topic(tree: Option<&RoadmapDetail>, topic: Topic) -> Option<RoadmapDetail> {
    let tree = tree?;
    let mut topics = tree.topics.clone();
    topics.push(recalc_topic(topic));
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Swap the topic with `old_id` for `topic`, keeping its position.
#[must_use]
pub fn replace_topic(tree: Option<&RoadmapDetail>, old_id: &str, topic: &Topic) -> Option<RoadmapDetail> {
    let tree = tree?;
    if tree.topic(old_id).is_none() {
        return Some(tree.clone());
    }
    let topics = tree
        .topics
        .iter()
        .map(|t| {
            if t.id == old_id {
                recalc_topic(topic.clone())
            } else {
                t.clone()
            }
        })
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Merge title/description changes into the topic with `topic_id`.
#[must_use]
pub fn patch_topic(
    tree: Option<&RoadmapDetail>,
    topic_id: &str,
    update: &TopicUpdate,
) -> Option<RoadmapDetail> {
    let tree = tree?;
    let topics = tree
        .topics
        .iter()
        .map(|t| {
            if t.id == topic_id {
                update.applied_to(t)
            } else {
                t.clone()
            }
        })
        .collect();
    Some(recalc_roadmap(tree.with_topics(topics)))
}

/// Merge roadmap-level field changes into a cached detail tree.
#[must_use]
pub fn patch_roadmap_detail(
    tree: Option<&RoadmapDetail>,
    update: &RoadmapUpdate,
) -> Option<RoadmapDetail> {
    tree.map(|t| recalc_roadmap(update.applied_to_detail(t)))
}

/// Put a fetched tree into canonical shape.
///
/// Topics and tasks are stably ordered by `(sort_order, created_at)` and all
/// aggregates are recomputed.
#[must_use]
pub fn normalize(mut tree: RoadmapDetail) -> RoadmapDetail {
    tree.topics
        .sort_by(|a, b| (a.sort_order, a.created_at).cmp(&(b.sort_order, b.created_at)));
    for topic in &mut tree.topics {
        topic
            .tasks
            .sort_by(|a, b| (a.sort_order, a.created_at).cmp(&(b.sort_order, b.created_at)));
    }
    recalc_tree(tree)
}

/// Ordering key for a provisional entity appended after `siblings`.
pub fn next_sort_order(siblings: impl IntoIterator<Item = i64>) -> i64 {
    siblings.into_iter().max().map_or(1, |max| max.max(0) + 1)
}

// ---------------------------------------------------------------------------
// Roadmap list
// ---------------------------------------------------------------------------

/// Append a roadmap row.
#[must_use]
pub fn add_roadmap(
    list: Option<&[RoadmapSummary]>,
    row: RoadmapSummary,
) -> Option<Vec<RoadmapSummary>> {
    let list = list?;
    let mut next = list.to_vec();
    next.push(row);
    Some(next)
}

/// Merge `update` into the row with `roadmap_id`.
#[must_use]
pub fn patch_roadmap(
    list: Option<&[RoadmapSummary]>,
    roadmap_id: &str,
    update: &RoadmapUpdate,
) -> Option<Vec<RoadmapSummary>> {
    let list = list?;
    Some(
        list.iter()
            .map(|r| {
                if r.id == roadmap_id {
                    update.applied_to_summary(r)
                } else {
                    r.clone()
                }
            })
            .collect(),
    )
}

/// Swap the row with `old_id` for `row`, keeping its position.
#[must_use]
pub fn replace_roadmap(
    list: Option<&[RoadmapSummary]>,
    old_id: &str,
    row: &RoadmapSummary,
) -> Option<Vec<RoadmapSummary>> {
    let list = list?;
    Some(
        list.iter()
            .map(|r| if r.id == old_id { row.clone() } else { r.clone() })
            .collect(),
    )
}

/// Drop the row with `roadmap_id`.
#[must_use]
pub fn remove_roadmap(
    list: Option<&[RoadmapSummary]>,
    roadmap_id: &str,
) -> Option<Vec<RoadmapSummary>> {
    let list = list?;
    Some(list.iter().filter(|r| r.id != roadmap_id).cloned().collect())
}
