// src/pipeline/transforms/mod.rs

mod label_prefix;
mod simulate_work;
mod uppercase;

pub use label_prefix::LabelPrefix;
pub use simulate_work::SimulateWork;
pub use uppercase::Uppercase;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::worker::TransformConfig;
use crate::error::Result;

/// A per-message transform. Workers may see the same message more than once,
/// so implementations must give the same output for the same input.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str; // For logging/error reporting

    async fn apply(&self, payload: &str) -> Result<String>;
}

/// Builds the transform described by the worker configuration.
#[instrument(skip(config), fields(transform = config.name()))]
pub fn build_transform(config: &TransformConfig) -> Box<dyn Transform> {
    debug!(params = ?config, "Building transform");
    match config {
        TransformConfig::Uppercase => Box::new(Uppercase),
        TransformConfig::LabelPrefix { label } => Box::new(LabelPrefix::new(label.clone())),
        TransformConfig::SimulateWork { unit_ms, marker } => {
            Box::new(SimulateWork::new(Duration::from_millis(*unit_ms), *marker))
        }
    }
}
