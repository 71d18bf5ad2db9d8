//! `ureq`-backed implementation of [`Transport`].
//!
//! `ureq` is blocking, so each request runs on tokio's blocking pool and the
//! calling task only suspends at the network boundary.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Transport, TransportError};
use crate::config::ApiConfig;
use crate::model::{
    DashboardStats, RoadmapCreate, RoadmapDetail, RoadmapSummary, RoadmapUpdate, Task, TaskCreate,
    TaskUpdate, Topic, TopicCreate, TopicUpdate,
};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("learnpath/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, &format!("{}{path}", self.base_url))
            .set("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set(API_KEY_HEADER, key);
        }
        request
    }

    async fn fetch_json<T>(&self, method: &'static str, path: String) -> Result<T, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.exchange(method, path, None::<&()>).await
    }

    async fn exchange<T, B>(
        &self,
        method: &'static str,
        path: String,
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized + Sync,
    {
        let endpoint = format!("{method} {path}");
        let body = encode_body(&endpoint, body)?;
        let request = self.request(method, &path);
        run_blocking(endpoint.clone(), move || {
            let response = send(request, body, &endpoint)?;
            response
                .into_json::<T>()
                .map_err(|err| TransportError::Decode {
                    endpoint,
                    message: err.to_string(),
                })
        })
        .await
    }

    async fn discard(&self, method: &'static str, path: String) -> Result<(), TransportError> {
        let endpoint = format!("{method} {path}");
        let request = self.request(method, &path);
        run_blocking(endpoint.clone(), move || {
            send(request, None, &endpoint).map(drop)
        })
        .await
    }
}

fn encode_body<B>(endpoint: &str, body: Option<&B>) -> Result<Option<serde_json::Value>, TransportError>
where
    B: Serialize + ?Sized,
{
    body.map(serde_json::to_value)
        .transpose()
        .map_err(|err| TransportError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("could not encode request body: {err}"),
        })
}

fn send(
    request: ureq::Request,
    body: Option<serde_json::Value>,
    endpoint: &str,
) -> Result<ureq::Response, TransportError> {
    let result = match body {
        Some(json) => request.send_json(json),
        None => request.call(),
    };
    result.map_err(|err| match err {
        ureq::Error::Status(status, _) => TransportError::Status {
            endpoint: endpoint.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => TransportError::Network {
            endpoint: endpoint.to_string(),
            message: transport.to_string(),
        },
    })
}

async fn run_blocking<T, F>(endpoint: String, f: F) -> Result<T, TransportError>
where
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| TransportError::Network {
            endpoint,
            message: format!("request task did not complete: {err}"),
        })?
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_roadmaps(&self) -> Result<Vec<RoadmapSummary>, TransportError> {
        self.fetch_json("GET", "/api/roadmaps".into()).await
    }

    async fn get_roadmap(&self, roadmap_id: &str) -> Result<RoadmapDetail, TransportError> {
        self.fetch_json("GET", format!("/api/roadmaps/{roadmap_id}"))
            .await
    }

    async fn create_roadmap(&self, body: &RoadmapCreate) -> Result<RoadmapSummary, TransportError> {
        self.exchange("POST", "/api/roadmaps".into(), Some(body))
            .await
    }

    async fn update_roadmap(
        &self,
        roadmap_id: &str,
        body: &RoadmapUpdate,
    ) -> Result<RoadmapSummary, TransportError> {
        self.exchange("PATCH", format!("/api/roadmaps/{roadmap_id}"), Some(body))
            .await
    }

    async fn delete_roadmap(&self, roadmap_id: &str) -> Result<(), TransportError> {
        self.discard("DELETE", format!("/api/roadmaps/{roadmap_id}"))
            .await
    }

    async fn create_topic(
        &self,
        roadmap_id: &str,
        body: &TopicCreate,
    ) -> Result<Topic, TransportError> {
        self.exchange(
            "POST",
            format!("/api/roadmaps/{roadmap_id}/topics"),
            Some(body),
        )
        .await
    }

    async fn update_topic(
        &self,
        topic_id: &str,
        body: &TopicUpdate,
    ) -> Result<Topic, TransportError> {
        self.exchange("PATCH", format!("/api/topics/{topic_id}"), Some(body))
            .await
    }

    async fn delete_topic(&self, topic_id: &str) -> Result<(), TransportError> {
        self.discard("DELETE", format!("/api/topics/{topic_id}"))
            .await
    }

    async fn create_task(&self, topic_id: &str, body: &TaskCreate) -> Result<Task, TransportError> {
        self.exchange("POST", format!("/api/topics/{topic_id}/tasks"), Some(body))
            .await
    }

    async fn update_task(&self, task_id: &str, body: &TaskUpdate) -> Result<Task, TransportError> {
        self.exchange("PATCH", format!("/api/tasks/{task_id}"), Some(body))
            .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), TransportError> {
        self.discard("DELETE", format!("/api/tasks/{task_id}"))
            .await
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, TransportError> {
        self.fetch_json("GET", "/api/dashboard/stats".into()).await
    }
}
