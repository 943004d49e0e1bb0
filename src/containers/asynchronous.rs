//! Fire-and-forget execution branch

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{ActionContainer, ContainerState, SourceSpan, TestAction};

/// Forks its children onto a background task and returns immediately,
/// letting the surrounding flow continue while the branch runs.
///
/// When the branch finishes, the configured success or error actions run
/// on the background task. A branch failure never propagates through
/// `execute`; it is recorded on the context's asynchronous error list so
/// the surrounding test can inspect it at a synchronization point.
pub struct Async {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    actions: Vec<Arc<dyn TestAction>>,
    success_actions: Vec<Arc<dyn TestAction>>,
    error_actions: Vec<Arc<dyn TestAction>>,
    state: Arc<ContainerState>,
}

impl Async {
    pub fn new() -> Self {
        Self {
            name: "async".to_string(),
            description: None,
            span: None,
            actions: Vec::new(),
            success_actions: Vec::new(),
            error_actions: Vec::new(),
            state: Arc::new(ContainerState::new()),
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

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn action_arc(mut self, action: Arc<dyn TestAction>) -> Self {
        self.actions.push(action);
        self
    }

    /// Runs on the background task after the branch completes cleanly.
    pub fn on_success(mut self, action: impl TestAction + 'static) -> Self {
        self.success_actions.push(Arc::new(action));
        self
    }

    /// Runs on the background task after the first branch failure.
    pub fn on_error(mut self, action: impl TestAction + 'static) -> Self {
        self.error_actions.push(Arc::new(action));
        self
    }
}

impl Default for Async {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for Async {
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
        let name = self.name.clone();
        let actions = self.actions.clone();
        let success_actions = self.success_actions.clone();
        let error_actions = self.error_actions.clone();
        let state = Arc::clone(&self.state);
        let branch_context = context.clone();

        debug!(container = name, children = actions.len(), "forking branch");
        tokio::spawn(async move {
            let mut outcome = Ok(());
            for child in &actions {
                state.set_last_executed(Arc::clone(child));
                branch_context.set_active_action(child.name());
                if let Err(error) = child.execute(&branch_context).await {
                    outcome = Err(error);
                    break;
                }
            }

            match outcome {
                Ok(()) => {
                    state.mark_done();
                    for action in &success_actions {
                        if let Err(error) = action.execute(&branch_context).await {
                            warn!(container = name, %error, "success action failed");
                            branch_context.push_async_error(error);
                        }
                    }
                }
                Err(error) => {
                    warn!(container = name, %error, "branch failed");
                    for action in &error_actions {
                        if let Err(handler_error) = action.execute(&branch_context).await {
                            warn!(container = name, %handler_error, "error action failed");
                            branch_context.push_async_error(handler_error);
                        }
                    }
                    branch_context.push_async_error(error);
                }
            }
        });

        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Async {
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
