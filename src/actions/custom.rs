use async_trait::async_trait;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{SourceSpan, TestAction};

/// Adapts a plain closure into a [`TestAction`]. Handy for glue logic and
/// used heavily by the test suites.
pub struct CustomAction {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    body: Box<dyn Fn(&TestContext) -> Result<()> + Send + Sync>,
}

impl CustomAction {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&TestContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            span: None,
            body: Box::new(body),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn span(mut self, start_line: u32, end_line: u32) -> Self {
        self.span = Some(SourceSpan::new(start_line, end_line));
        self
    }
}

#[async_trait]
impl TestAction for CustomAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        (self.body)(context)
    }
}
