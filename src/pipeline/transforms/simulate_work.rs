use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use super::Transform;
use crate::error::Result;

/// Sleeps `unit` once per occurrence of `marker` in the payload, then returns
/// the payload unchanged. `"task..."` with the default marker is three units
/// of work.
pub struct SimulateWork {
    unit: Duration,
    marker: char,
}

impl SimulateWork {
    pub fn new(unit: Duration, marker: char) -> Self {
        SimulateWork { unit, marker }
    }

    pub fn work_for(&self, payload: &str) -> Duration {
        let units = payload.chars().filter(|c| *c == self.marker).count();
        self.unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl Transform for SimulateWork {
    fn name(&self) -> &'static str {
        "SimulateWork"
    }

    async fn apply(&self, payload: &str) -> Result<String> {
        let work = self.work_for(payload);
        debug!(work_ms = work.as_millis() as u64, "Simulating work");
        if !work.is_zero() {
            sleep(work).await;
        }
        Ok(payload.to_string())
    }
}
