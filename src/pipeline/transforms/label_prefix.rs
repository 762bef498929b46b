use async_trait::async_trait;

use super::Transform;
use crate::error::Result;

/// Renders the payload as `"<label>: <payload>"`.
pub struct LabelPrefix {
    label: String,
}

impl LabelPrefix {
    pub fn new(label: impl Into<String>) -> Self {
        LabelPrefix {
            label: label.into(),
        }
    }
}

#[async_trait]
impl Transform for LabelPrefix {
    fn name(&self) -> &'static str {
        "LabelPrefix"
    }

    async fn apply(&self, payload: &str) -> Result<String> {
        Ok(format!("{}: {}", self.label, payload))
    }
}
