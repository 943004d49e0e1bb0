//! Conditional branch execution

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::condition::Condition;
use crate::engine::{run_children, ActionContainer, ContainerState, SourceSpan, TestAction};

/// Evaluates its condition once; executes all children in order when it
/// holds, skips them silently otherwise.
pub struct Conditional {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    condition: Condition,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl Conditional {
    pub fn new(condition: impl Into<Condition>) -> Self {
        Self {
            name: "conditional".to_string(),
            description: None,
            span: None,
            condition: condition.into(),
            actions: Vec::new(),
            state: ContainerState::new(),
        }
    }

    /// Branch on a predicate instead of an expression string
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(i64, &TestContext) -> bool + Send + Sync + 'static,
    {
        Self::new(Condition::predicate(predicate))
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
}

#[async_trait]
impl TestAction for Conditional {
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
        if self.condition.test(context)? {
            run_children(self, context).await?;
        } else {
            debug!(container = self.name, "condition not satisfied, skipping children");
        }
        self.state.mark_done();
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Conditional {
    fn actions(&self) -> &[Arc<dyn TestAction>] {
        &self.actions
    }

    fn last_executed(&self) -> Option<Arc<dyn TestAction>> {
        self.state.last_executed()
    }

    fn set_last_executed(&self, action: Arc<dyn TestAction>) {
        self.state.set_last_executed(action);
    }

    /// Done once executed, or as soon as the condition no longer holds;
    /// re-entrant schedulers use this to skip the branch cooperatively.
    fn is_done(&self, context: &TestContext) -> bool {
        self.state.is_done() || !self.condition.test(context).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CustomAction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_action(count: &Arc<AtomicUsize>) -> CustomAction {
        let count = Arc::clone(count);
        CustomAction::new("count", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_children_run_when_condition_true() {
        let count = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();
        ctx.set_variable("ready", "true");

        let branch = Conditional::new("${ready}")
            .action(counter_action(&count))
            .action(counter_action(&count));
        branch.execute(&ctx).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_children_skipped_when_condition_false() {
        let count = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();

        let branch = Conditional::new("1 = 2").action(counter_action(&count));
        branch.execute(&ctx).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(branch.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_false_condition_reports_done_before_execution() {
        let ctx = TestContext::new();
        let branch = Conditional::new("false").action(CustomAction::new("noop", |_| Ok(())));
        assert!(branch.is_done(&ctx));

        let pending = Conditional::new("true").action(CustomAction::new("noop", |_| Ok(())));
        assert!(!pending.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_malformed_condition_fails() {
        let ctx = TestContext::new();
        let branch = Conditional::new("1 zz 2").action(CustomAction::new("noop", |_| Ok(())));
        assert!(branch.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_predicate_branch() {
        let count = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();
        ctx.set_variable("mode", "fast");

        let branch = Conditional::when(|_, ctx| {
            ctx.get_variable_string("mode").map(|m| m == "fast").unwrap_or(false)
        })
        .action(counter_action(&count));
        branch.execute(&ctx).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
