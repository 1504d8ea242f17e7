use serde::{Deserialize, Serialize};

/// One stored episode, as returned by `GET /time-data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRecord {
    pub id: i64,
    /// ISO 8601 timestamp.
    pub date: String,
    pub seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeDataResponse {
    pub data: Vec<TimeRecord>,
}

/// Body of `POST /time-data`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeDataUpload {
    pub seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub max_seconds: u64,
    pub min_seconds: u64,
    pub avg_seconds: f64,
    pub good_count: usize,
    pub total_count: usize,
}

impl DashboardStats {
    pub fn not_good_count(&self) -> usize {
        self.total_count - self.good_count
    }

    /// Average with two decimals, as shown on the dashboard.
    pub fn average_display(&self) -> String {
        format!("{:.2}", self.avg_seconds)
    }
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            max_seconds: 0,
            min_seconds: 0,
            avg_seconds: 0.0,
            good_count: 0,
            total_count: 0,
        }
    }
}
