//! Contract with the REST backend.
//!
//! The controller only ever sees [`Transport`]; [`http::HttpTransport`] is the
//! production implementation. Every failure, whatever its cause, is a
//! [`TransportError`] and is handled identically by the controller.

pub mod http;

use async_trait::async_trait;

use crate::error::ErrorCode;
use crate::model::{
    DashboardStats, RoadmapCreate, RoadmapDetail, RoadmapSummary, RoadmapUpdate, Task, TaskCreate,
    TaskUpdate, Topic, TopicCreate, TopicUpdate,
};

/// A request that did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout, or any other I/O problem.
    #[error("request to {endpoint} failed: {message}")]
    Network { endpoint: String, message: String },

    /// The server answered with a non-2xx status.
    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The body could not be decoded into the expected shape.
    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl TransportError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::TransportFailure
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Network { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// Typed request/response operations against the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn list_roadmaps(&self) -> Result<Vec<RoadmapSummary>, TransportError>;

    async fn get_roadmap(&self, roadmap_id: &str) -> Result<RoadmapDetail, TransportError>;

    async fn create_roadmap(&self, body: &RoadmapCreate) -> Result<RoadmapSummary, TransportError>;

    async fn update_roadmap(
        &self,
        roadmap_id: &str,
        body: &RoadmapUpdate,
    ) -> Result<RoadmapSummary, TransportError>;

    async fn delete_roadmap(&self, roadmap_id: &str) -> Result<(), TransportError>;

    async fn create_topic(
        &self,
        roadmap_id: &str,
        body: &TopicCreate,
    ) -> Result<Topic, TransportError>;

    async fn update_topic(&self, topic_id: &str, body: &TopicUpdate)
    -> Result<Topic, TransportError>;

    async fn delete_topic(&self, topic_id: &str) -> Result<(), TransportError>;

    async fn create_task(&self, topic_id: &str, body: &TaskCreate) -> Result<Task, TransportError>;

    async fn update_task(&self, task_id: &str, body: &TaskUpdate) -> Result<Task, TransportError>;

    async fn delete_task(&self, task_id: &str) -> Result<(), TransportError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, TransportError>;
}
