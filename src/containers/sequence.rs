//! Strict in-order execution

use std::sync::Arc;

use async_trait::async_trait;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{run_children, ActionContainer, ContainerState, SourceSpan, TestAction};

/// Executes its children in order on the calling task; the first failure
/// aborts the remaining children and propagates.
pub struct Sequence {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            name: "sequential".to_string(),
            description: None,
            span: None,
            actions: Vec::new(),
            state: ContainerState::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn span(mut self, start_line: u32, end_line: u32) -> Self {
        self.span = Some(SourceSpan::new(start_line, end_line));
        self
    }

    /// Append a child action
    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Append an already-shared child action
    pub fn action_arc(mut self, action: Arc<dyn TestAction>) -> Self {
        self.actions.push(action);
        self
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for Sequence {
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
        run_children(self, context).await?;
        self.state.mark_done();
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Sequence {
    fn actions(&self) -> &[Arc<dyn TestAction>] {
        &self.actions
    }

    fn last_executed(&self) -> Option<Arc<dyn TestAction>> {
        self.state.last_executed()
    }

    fn set_last_executed(&self, action: Arc<dyn TestAction>) {
        self.state.set_last_executed(action);
    }

    fn is_done(&self, _context: &TestContext) -> bool {
        self.state.is_done()
    }
}
