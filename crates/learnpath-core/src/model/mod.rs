pub mod dashboard;
pub mod entity;
pub mod ids;
pub mod payload;
pub mod status;

pub use dashboard::{DailyCompletions, DashboardStats};
pub use entity::{RoadmapDetail, RoadmapSummary, Task, Topic};
pub use payload::{RoadmapCreate, RoadmapUpdate, TaskCreate, TaskUpdate, TopicCreate, TopicUpdate};
pub use status::{ParseStatusError, TaskStatus};
