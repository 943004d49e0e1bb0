//! Expected-failure assertion

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::common::{EngineError, ErrorKind, Result};
use crate::context::TestContext;
use crate::engine::{run_child, ActionContainer, ContainerState, SourceSpan, TestAction};

/// Wraps a single action and inverts its outcome: the wrapped action is
/// required to fail with the expected error kind. A clean run, or a
/// failure of a different kind, is itself a failure.
///
/// An optional message fragment narrows the match further.
pub struct Assert {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    expected: ErrorKind,
    expected_message: Option<String>,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl Assert {
    pub fn new(expected: ErrorKind, action: impl TestAction + 'static) -> Self {
        Self {
            name: "assert".to_string(),
            description: None,
            span: None,
            expected,
            expected_message: None,
            actions: vec![Arc::new(action)],
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

    /// Requires the failure message to contain this fragment. The fragment
    /// may carry placeholders, resolved at assertion time.
    pub fn message(mut self, fragment: impl Into<String>) -> Self {
        self.expected_message = Some(fragment.into());
        self
    }
}

#[async_trait]
impl TestAction for Assert {
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
        let child = Arc::clone(&self.actions[0]);
        let child_name = child.name().to_string();

        match run_child(self, &child, context).await {
            Ok(()) => Err(EngineError::Assertion(format!(
                "missing expected failure: '{child_name}' finished without error, \
                 expected {}",
                self.expected
            ))),
            Err(error) => {
                if error.kind() != self.expected {
                    return Err(EngineError::Assertion(format!(
                        "'{child_name}' failed with {} where {} was expected: {error}",
                        error.kind(),
                        self.expected
                    )));
                }
                if let Some(fragment) = &self.expected_message {
                    let fragment = context.resolve_dynamic_content(fragment)?;
                    let message = error.to_string();
                    if !message.contains(&fragment) {
                        return Err(EngineError::Assertion(format!(
                            "'{child_name}' failed as expected but the message \
                             '{message}' does not contain '{fragment}'"
                        )));
                    }
                }
                debug!(container = self.name, child = child_name, "caught expected failure");
                self.state.mark_done();
                Ok(())
            }
        }
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Assert {
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

    fn failing() -> CustomAction {
        CustomAction::new("boom", |_| Err(EngineError::action_failed("boom", "kaput")))
    }

    #[tokio::test]
    async fn test_swallows_the_expected_failure() {
        let ctx = TestContext::new();
        let assert = Assert::new(ErrorKind::ActionFailed, failing());
        assert.execute(&ctx).await.unwrap();
        assert!(assert.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_missing_failure_is_an_assertion_error() {
        let ctx = TestContext::new();
        let assert = Assert::new(ErrorKind::ActionFailed, CustomAction::new("fine", |_| Ok(())));

        let err = assert.execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assertion);
        assert!(err.to_string().contains("missing expected failure"));
    }

    #[tokio::test]
    async fn test_wrong_kind_is_an_assertion_error() {
        let ctx = TestContext::new();
        let assert = Assert::new(ErrorKind::Validation, failing());

        let err = assert.execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assertion);
    }

    #[tokio::test]
    async fn test_message_fragment_with_placeholder() {
        let ctx = TestContext::new();
        ctx.set_variable("detail", "kaput");

        let assert = Assert::new(ErrorKind::ActionFailed, failing()).message("${detail}");
        assert.execute(&ctx).await.unwrap();

        let mismatched =
            Assert::new(ErrorKind::ActionFailed, failing()).message("something else entirely");
        let err = mismatched.execute(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("does not contain"));
    }
}
