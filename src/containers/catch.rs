//! Failure suppression around a nested flow

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::common::{ErrorKind, Result};
use crate::context::TestContext;
use crate::engine::{run_child, ActionContainer, ContainerState, SourceSpan, TestAction};

/// Runs its children in order and suppresses matching failures: a caught
/// child is logged and the remaining children still run. Failures of a
/// kind the catch was not configured for propagate untouched.
///
/// Without a configured kind, every failure is caught.
pub struct Catch {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    kind: Option<ErrorKind>,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl Catch {
    /// Catches every failure kind.
    pub fn any() -> Self {
        Self {
            name: "catch".to_string(),
            description: None,
            span: None,
            kind: None,
            actions: Vec::new(),
            state: ContainerState::new(),
        }
    }

    /// Catches only failures of the given kind.
    pub fn of(kind: ErrorKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::any()
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

    fn catches(&self, kind: ErrorKind) -> bool {
        self.kind.is_none() || self.kind == Some(kind)
    }
}

#[async_trait]
impl TestAction for Catch {
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
        for child in &self.actions {
            if let Err(error) = run_child(self, child, context).await {
                if !self.catches(error.kind()) {
                    return Err(error);
                }
                warn!(container = self.name, child = child.name(), %error, "caught failure");
            }
        }
        self.state.mark_done();
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Catch {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CustomAction;
    use crate::common::EngineError;

    #[tokio::test]
    async fn test_caught_failure_lets_later_children_run() {
        let ctx = TestContext::new();
        let catch = Catch::any()
            .action(CustomAction::new("boom", |_| {
                Err(EngineError::action_failed("boom", "kaput"))
            }))
            .action(CustomAction::new("after", |ctx| {
                ctx.set_variable("after", true);
                Ok(())
            }));

        catch.execute(&ctx).await.unwrap();
        assert!(ctx.has_variable("after"));
        assert!(catch.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_unmatched_kind_propagates() {
        let ctx = TestContext::new();
        let catch = Catch::of(ErrorKind::Validation)
            .action(CustomAction::new("boom", |_| {
                Err(EngineError::action_failed("boom", "kaput"))
            }))
            .action(CustomAction::new("after", |ctx| {
                ctx.set_variable("after", true);
                Ok(())
            }));

        let err = catch.execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionFailed);
        assert!(!ctx.has_variable("after"));
        assert!(!catch.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_matching_kind_is_suppressed() {
        let ctx = TestContext::new();
        let catch = Catch::of(ErrorKind::ActionFailed).action(CustomAction::new("boom", |_| {
            Err(EngineError::action_failed("boom", "kaput"))
        }));
        catch.execute(&ctx).await.unwrap();
    }
}
