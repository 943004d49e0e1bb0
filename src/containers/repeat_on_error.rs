//! Retry loop treating child failure as a retry signal

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::condition::Condition;
use crate::engine::{run_children, ActionContainer, ContainerState, SourceSpan, TestAction};

/// Retries its children until they succeed or retries are exhausted.
///
/// On a child failure the index is incremented and the termination
/// condition tested: satisfied means retries are exhausted and the child's
/// error is rethrown; otherwise the loop sleeps `auto_sleep` and retries
/// with the incremented index. A successful pass breaks immediately
/// without testing the condition.
pub struct RepeatOnErrorUntilTrue {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    condition: Condition,
    index_name: String,
    start: i64,
    auto_sleep: Duration,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl RepeatOnErrorUntilTrue {
    pub fn new(condition: impl Into<Condition>) -> Self {
        Self {
            name: "repeat-on-error".to_string(),
            description: None,
            span: None,
            condition: condition.into(),
            index_name: "i".to_string(),
            start: 1,
            auto_sleep: Duration::from_millis(1000),
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

    /// Delay between retries (default 1s)
    pub fn auto_sleep(mut self, auto_sleep: Duration) -> Self {
        self.auto_sleep = auto_sleep;
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
impl TestAction for RepeatOnErrorUntilTrue {
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
            context.set_variable(&self.index_name, index);

            match run_children(self, context).await {
                Ok(()) => break,
                Err(error) => {
                    index += 1;
                    if self
                        .condition
                        .test_with_index(&self.index_name, index, context)?
                    {
                        info!(container = self.name, "all retries failed, rethrowing");
                        return Err(error);
                    }

                    warn!(
                        container = self.name,
                        %error,
                        retry = index,
                        "caught failure, retrying"
                    );
                    if !self.auto_sleep.is_zero() {
                        tokio::time::sleep(self.auto_sleep).await;
                    }
                }
            }
        }

        self.state.mark_done();
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for RepeatOnErrorUntilTrue {
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
