use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{services::ServiceResult, session::metrics::SessionMetrics};

/// Durable storage for the counters of finished sessions.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_completed(&self, metrics: SessionMetrics) -> ServiceResult<()>;

    async fn completed(&self) -> ServiceResult<Vec<SessionMetrics>>;
}

/// Keeps completed metrics in memory for the life of the process.
#[derive(Default)]
pub struct MemoryMetricsSink {
    completed: Mutex<Vec<SessionMetrics>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn write_completed(&self, metrics: SessionMetrics) -> ServiceResult<()> {
        self.completed.lock().push(metrics);
        Ok(())
    }

    async fn completed(&self) -> ServiceResult<Vec<SessionMetrics>> {
        Ok(self.completed.lock().clone())
    }
}
