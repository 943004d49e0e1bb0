//! Post-test loop

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::condition::Condition;
use crate::engine::{run_children, ActionContainer, ContainerState, SourceSpan, TestAction};

/// Repeats its children until the condition holds, testing *after* each
/// pass with the already-incremented index. Children always run at least
/// once, even when the condition is satisfied from the start.
pub struct RepeatUntilTrue {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    condition: Condition,
    index_name: String,
    start: i64,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl RepeatUntilTrue {
    pub fn new(condition: impl Into<Condition>) -> Self {
        Self {
            name: "repeat".to_string(),
            description: None,
            span: None,
            condition: condition.into(),
            index_name: "i".to_string(),
            start: 1,
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

    /// Name of the loop index variable (default `i`)
    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// Starting index (default 1)
    pub fn start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn action_arc(mut self, action: Arc<dyn TestAction>) -> Self {
        self.actions.push(action);
        self
    }
}

#[async_trait]
impl TestAction for RepeatUntilTrue {
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
        let mut index = self.start;

        loop {
            debug!(container = self.name, index, "repeat pass");
            context.set_variable(&self.index_name, index);
            run_children(self, context).await?;
            index += 1;

            if self
                .condition
                .test_with_index(&self.index_name, index, context)?
            {
                break;
            }
        }

        self.state.mark_done();
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for RepeatUntilTrue {
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
