use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Completions on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCompletions {
    pub date: NaiveDate,
    pub count: u32,
}

/// Cross-roadmap statistics served by the dashboard endpoint.
///
/// `tasks_completed_per_day` covers a trailing 30-day window, oldest first,
/// with zero-count days included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_roadmaps: u32,
    pub total_topics: u32,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub completion_percent: f64,
    /// Consecutive days, ending today, with at least one completion.
    pub current_streak: u32,
    #[serde(default)]
    pub tasks_completed_per_day: Vec<DailyCompletions>,
}

impl DashboardStats {
    /// Sum of completions across the served window.
    #[must_use]
    pub fn completed_in_window(&self) -> u32 {
        self.tasks_completed_per_day.iter().map(|d| d.count).sum()
    }

    /// Day with the most completions; the earliest wins ties.
    #[must_use]
    pub fn best_day(&self) -> Option<&DailyCompletions> {
        self.tasks_completed_per_day
            .iter()
            .filter(|d| d.count > 0)
            .fold(None, |best: Option<&DailyCompletions>, day| match best {
                Some(b) if b.count >= day.count => Some(b),
                _ => Some(day),
            })
    }
}
