use async_trait::async_trait;

use super::Transform;
use crate::error::Result;

/// Unicode-aware uppercase of the whole payload.
pub struct Uppercase;

#[async_trait]
impl Transform for Uppercase {
    fn name(&self) -> &'static str {
        "Uppercase"
    }

    async fn apply(&self, payload: &str) -> Result<String> {
        Ok(payload.to_uppercase())
    }
}
