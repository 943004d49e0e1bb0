use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{SourceSpan, TestAction};

/// Pauses the current flow for a fixed duration.
pub struct SleepAction {
    name: String,
    span: Option<SourceSpan>,
    duration: Duration,
}

impl SleepAction {
    pub fn new(duration: Duration) -> Self {
        Self {
            name: "sleep".to_string(),
            span: None,
            duration,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn span(mut self, start_line: u32, end_line: u32) -> Self {
        self.span = Some(SourceSpan::new(start_line, end_line));
        self
    }
}

#[async_trait]
impl TestAction for SleepAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, _context: &TestContext) -> Result<()> {
        debug!(duration_ms = self.duration.as_millis() as u64, "sleeping");
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}
