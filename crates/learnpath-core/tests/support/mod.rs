#![allow(dead_code)]

//! Scripted in-memory backend for scenario tests.
//!
//! Keeps a server-side copy of every roadmap, applies mutations to it like
//! the real API would, records every call, and can be told to fail or to
//! park a given operation until released.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use learnpath_core::aggregate::recalc_tree;
use learnpath_core::config::SyncConfig;
use learnpath_core::model::{
    DashboardStats, RoadmapCreate, RoadmapDetail, RoadmapSummary, RoadmapUpdate, Task, TaskCreate,
    TaskStatus, TaskUpdate, Topic, TopicCreate, TopicUpdate,
};
use learnpath_core::transport::{Transport, TransportError};
use learnpath_core::SyncClient;

pub fn ts(min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, min, 0)
        .single()
        .expect("valid timestamp")
}

pub fn task(id: &str, topic_id: &str, status: TaskStatus, order: i64) -> Task {
    Task {
        id: id.into(),
        topic_id: topic_id.into(),
        title: format!("task {id}"),
        notes: None,
        status,
        sort_order: order,
        completed_at: status.is_completed().then(|| ts(1)),
        created_at: ts(0),
        updated_at: ts(0),
    }
}

pub fn topic(id: &str, roadmap_id: &str, order: i64, tasks: Vec<Task>) -> Topic {
    Topic {
        id: id.into(),
        roadmap_id: roadmap_id.into(),
        title: format!("topic {id}"),
        description: None,
        sort_order: order,
        tasks,
        total_tasks: 0,
        completed_tasks: 0,
        progress_percent: 0.0,
        created_at: ts(0),
        updated_at: ts(0),
    }
}

pub fn roadmap(id: &str, topics: Vec<Topic>) -> RoadmapDetail {
    recalc_tree(RoadmapDetail {
        id: id.into(),
        title: format!("roadmap {id}"),
        description: None,
        color: "#6366f1".into(),
        sort_order: 1,
        is_archived: false,
        topics,
        total_tasks: 0,
        completed_tasks: 0,
        in_progress_tasks: 0,
        progress_percent: 0.0,
        created_at: ts(0),
        updated_at: ts(0),
    })
}

/// One topic `t1` holding `not_started`, `in_progress` and `completed` tasks.
pub fn three_task_roadmap() -> RoadmapDetail {
    roadmap(
        "r1",
        vec![topic(
            "t1",
            "r1",
            1,
            vec![
                task("a", "t1", TaskStatus::NotStarted, 1),
                task("b", "t1", TaskStatus::InProgress, 2),
                task("c", "t1", TaskStatus::Completed, 3),
            ],
        )],
    )
}

#[derive(Default)]
struct Server {
    roadmaps: BTreeMap<String, RoadmapDetail>,
    next_id: u32,
    failures: HashMap<&'static str, u32>,
    gates: HashMap<&'static str, Arc<Notify>>,
    calls: Vec<String>,
}

impl Server {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn roadmap_of_topic(&mut self, topic_id: &str) -> Option<&mut RoadmapDetail> {
        self.roadmaps
            .values_mut()
            .find(|r| r.topics.iter().any(|t| t.id == topic_id))
    }

    fn roadmap_of_task(&mut self, task_id: &str) -> Option<&mut RoadmapDetail> {
        self.roadmaps
            .values_mut()
            .find(|r| r.task(task_id).is_some())
    }
}

#[derive(Default)]
pub struct FakeTransport {
    server: Mutex<Server>,
}

fn not_found(endpoint: String) -> TransportError {
    TransportError::Status {
        endpoint,
        status: 404,
    }
}

impl FakeTransport {
    pub fn with_roadmaps(roadmaps: impl IntoIterator<Item = RoadmapDetail>) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut server = fake.server();
            for r in roadmaps {
                server.roadmaps.insert(r.id.clone(), r);
            }
        }
        Arc::new(fake)
    }

    fn server(&self) -> MutexGuard<'_, Server> {
        self.server.lock().expect("fake server lock")
    }

    /// Make the next `times` calls of `op` fail with a 500.
    pub fn fail(&self, op: &'static str, times: u32) {
        self.server().failures.insert(op, times);
    }

    /// Park every call of `op` until the returned handle is notified.
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.server().gates.insert(op, Arc::clone(&notify));
        notify
    }

    pub fn calls(&self) -> Vec<String> {
        self.server().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.server()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    pub fn server_roadmap(&self, id: &str) -> Option<RoadmapDetail> {
        self.server().roadmaps.get(id).cloned()
    }

    /// Record the call, wait on its gate, then apply any scripted failure.
    async fn enter(&self, op: &'static str, arg: &str) -> Result<(), TransportError> {
        let gate = {
            let mut server = self.server();
            server.calls.push(format!("{op} {arg}").trim_end().to_string());
            server.gates.get(op).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut server = self.server();
        match server.failures.get_mut(op) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(TransportError::Status {
                    endpoint: format!("{op} {arg}"),
                    status: 500,
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn list_roadmaps(&self) -> Result<Vec<RoadmapSummary>, TransportError> {
        let rows = self
            .server()
            .roadmaps
            .values()
            .map(|r| recalc_tree(r.clone()).summary())
            .collect();
        self.enter("list_roadmaps", "").await?;
        Ok(rows)
    }

    async fn get_roadmap(&self, roadmap_id: &str) -> Result<RoadmapDetail, TransportError> {
        // Read before the gate so a parked fetch answers with what the
        // server held when the request was sent.
        let detail = self.server().roadmaps.get(roadmap_id).cloned();
        self.enter("get_roadmap", roadmap_id).await?;
        detail.ok_or_else(|| not_found(format!("GET /api/roadmaps/{roadmap_id}")))
    }

    async fn create_roadmap(&self, body: &RoadmapCreate) -> Result<RoadmapSummary, TransportError> {
        self.enter("create_roadmap", &body.title).await?;
        let mut server = self.server();
        let id = server.mint("r");
        let mut detail = roadmap(&id, Vec::new());
        detail.title.clone_from(&body.title);
        detail.description.clone_from(&body.description);
        if let Some(color) = &body.color {
            detail.color.clone_from(color);
        }
        detail.sort_order = i64::try_from(server.roadmaps.len()).unwrap_or(0) + 1;
        let row = detail.summary();
        server.roadmaps.insert(id, detail);
        Ok(row)
    }

    async fn update_roadmap(
        &self,
        roadmap_id: &str,
        body: &RoadmapUpdate,
    ) -> Result<RoadmapSummary, TransportError> {
        self.enter("update_roadmap", roadmap_id).await?;
        let mut server = self.server();
        let detail = server
            .roadmaps
            .get_mut(roadmap_id)
            .ok_or_else(|| not_found(format!("PATCH /api/roadmaps/{roadmap_id}")))?;
        *detail = body.applied_to_detail(detail);
        Ok(detail.summary())
    }

    async fn delete_roadmap(&self, roadmap_id: &str) -> Result<(), TransportError> {
        self.enter("delete_roadmap", roadmap_id).await?;
        self.server()
            .roadmaps
            .remove(roadmap_id)
            .map(drop)
            .ok_or_else(|| not_found(format!("DELETE /api/roadmaps/{roadmap_id}")))
    }

    async fn create_topic(
        &self,
        roadmap_id: &str,
        body: &TopicCreate,
    ) -> Result<Topic, TransportError> {
        self.enter("create_topic", roadmap_id).await?;
        let mut server = self.server();
        let id = server.mint("t");
        let detail = server
            .roadmaps
            .get_mut(roadmap_id)
            .ok_or_else(|| not_found(format!("POST /api/roadmaps/{roadmap_id}/topics")))?;
        let order = detail.topics.iter().map(|t| t.sort_order).max().unwrap_or(0) + 1;
        let mut created = topic(&id, roadmap_id, order, Vec::new());
        created.title.clone_from(&body.title);
        created.description.clone_from(&body.description);
        detail.topics.push(created.clone());
        *detail = recalc_tree(detail.clone());
        Ok(created)
    }

    async fn update_topic(
        &self,
        topic_id: &str,
        body: &TopicUpdate,
    ) -> Result<Topic, TransportError> {
        self.enter("update_topic", topic_id).await?;
        let mut server = self.server();
        let detail = server
            .roadmap_of_topic(topic_id)
            .ok_or_else(|| not_found(format!("PATCH /api/topics/{topic_id}")))?;
        let mut updated = None;
        for t in &mut detail.topics {
            if t.id == topic_id {
                *t = body.applied_to(t);
                updated = Some(t.clone());
            }
        }
        updated.ok_or_else(|| not_found(format!("PATCH /api/topics/{topic_id}")))
    }

    async fn delete_topic(&self, topic_id: &str) -> Result<(), TransportError> {
        self.enter("delete_topic", topic_id).await?;
        let mut server = self.server();
        let detail = server
            .roadmap_of_topic(topic_id)
            .ok_or_else(|| not_found(format!("DELETE /api/topics/{topic_id}")))?;
        detail.topics.retain(|t| t.id != topic_id);
        *detail = recalc_tree(detail.clone());
        Ok(())
    }

    async fn create_task(&self, topic_id: &str, body: &TaskCreate) -> Result<Task, TransportError> {
        self.enter("create_task", topic_id).await?;
        let mut server = self.server();
        let id = server.mint("k");
        let detail = server
            .roadmap_of_topic(topic_id)
            .ok_or_else(|| not_found(format!("POST /api/topics/{topic_id}/tasks")))?;
        let mut created = None;
        for t in &mut detail.topics {
            if t.id == topic_id {
                let order = t.tasks.iter().map(|k| k.sort_order).max().unwrap_or(0) + 1;
                let mut new_task = task(&id, topic_id, TaskStatus::NotStarted, order);
                new_task.title.clone_from(&body.title);
                new_task.notes.clone_from(&body.notes);
                t.tasks.push(new_task.clone());
                created = Some(new_task);
            }
        }
        *detail = recalc_tree(detail.clone());
        created.ok_or_else(|| not_found(format!("POST /api/topics/{topic_id}/tasks")))
    }

    async fn update_task(&self, task_id: &str, body: &TaskUpdate) -> Result<Task, TransportError> {
        self.enter("update_task", task_id).await?;
        let mut server = self.server();
        let detail = server
            .roadmap_of_task(task_id)
            .ok_or_else(|| not_found(format!("PATCH /api/tasks/{task_id}")))?;
        let mut updated = None;
        for t in &mut detail.topics {
            for k in &mut t.tasks {
                if k.id == task_id {
                    *k = body.applied_to(k, ts(30));
                    updated = Some(k.clone());
                }
            }
        }
        *detail = recalc_tree(detail.clone());
        updated.ok_or_else(|| not_found(format!("PATCH /api/tasks/{task_id}")))
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), TransportError> {
        self.enter("delete_task", task_id).await?;
        let mut server = self.server();
        let detail = server
            .roadmap_of_task(task_id)
            .ok_or_else(|| not_found(format!("DELETE /api/tasks/{task_id}")))?;
        for t in &mut detail.topics {
            t.tasks.retain(|k| k.id != task_id);
        }
        *detail = recalc_tree(detail.clone());
        Ok(())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, TransportError> {
        let stats = {
            let server = self.server();
            let roadmaps: Vec<_> = server.roadmaps.values().cloned().map(recalc_tree).collect();
            let total_tasks: u32 = roadmaps.iter().map(|r| r.total_tasks).sum();
            let completed_tasks: u32 = roadmaps.iter().map(|r| r.completed_tasks).sum();
            DashboardStats {
                total_roadmaps: u32::try_from(roadmaps.len()).unwrap_or(u32::MAX),
                total_topics: roadmaps
                    .iter()
                    .map(|r| u32::try_from(r.topics.len()).unwrap_or(u32::MAX))
                    .sum(),
                total_tasks,
                completed_tasks,
                completion_percent: learnpath_core::aggregate::progress_percent(
                    completed_tasks,
                    total_tasks,
                ),
                current_streak: 0,
                tasks_completed_per_day: Vec::new(),
            }
        };
        self.enter("dashboard_stats", "").await?;
        Ok(stats)
    }
}

pub fn client(fake: &Arc<FakeTransport>) -> SyncClient {
    SyncClient::new(Arc::clone(fake) as Arc<dyn Transport>, SyncConfig::default())
}
