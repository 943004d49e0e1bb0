//! Concurrent fan-out with a join-all barrier

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::debug;

use crate::common::{EngineError, Result};
use crate::context::TestContext;
use crate::engine::{ActionContainer, ContainerState, SourceSpan, TestAction};

/// Launches one worker task per child, all against the same shared
/// context, then blocks until every worker finishes. There is no ordering
/// guarantee among children beyond the join barrier.
///
/// Worker failures are collected in child order and surfaced as a single
/// [`EngineError::Parallel`] aggregate after the join, so no failure is
/// ever silently lost.
pub struct Parallel {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl Parallel {
    pub fn new() -> Self {
        Self {
            name: "parallel".to_string(),
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

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn action_arc(mut self, action: Arc<dyn TestAction>) -> Self {
        self.actions.push(action);
        self
    }
}

impl Default for Parallel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for Parallel {
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
        let mut handles = Vec::with_capacity(self.actions.len());

        for child in &self.actions {
            self.set_last_executed(Arc::clone(child));
            let child = Arc::clone(child);
            let worker_context = context.clone();
            debug!(container = self.name, child = child.name(), "launching worker");
            handles.push(tokio::spawn(async move {
                worker_context.set_active_action(child.name());
                child.execute(&worker_context).await
            }));
        }

        // Join barrier: every worker finishes before failures are examined
        let results = join_all(handles).await;

        let mut failures = Vec::new();
        for (child, result) in self.actions.iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(join_error) => Err(EngineError::action_failed(
                    child.name(),
                    format!("worker panicked: {join_error}"),
                )),
            };
            if let Err(error) = outcome {
                if failures.is_empty() {
                    // Point the locator at the first failing child
                    self.set_last_executed(Arc::clone(child));
                }
                failures.push(error);
            }
        }

        if failures.is_empty() {
            self.state.mark_done();
            Ok(())
        } else {
            Err(EngineError::Parallel {
                failures,
                total: self.actions.len(),
            })
        }
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Parallel {
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn incrementer(counter: &Arc<AtomicUsize>) -> CustomAction {
        let counter = Arc::clone(counter);
        CustomAction::new("increment", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_join_barrier() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();

        let parallel = Parallel::new()
            .action(incrementer(&counter))
            .action(incrementer(&counter))
            .action(incrementer(&counter));
        parallel.execute(&ctx).await.unwrap();

        // All three increments visible immediately after the join
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(parallel.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_workers_share_the_context() {
        let ctx = TestContext::new();
        let parallel = Parallel::new()
            .action(CustomAction::new("left", |ctx| {
                ctx.set_variable("left", "done");
                Ok(())
            }))
            .action(CustomAction::new("right", |ctx| {
                ctx.set_variable("right", "done");
                Ok(())
            }));
        parallel.execute(&ctx).await.unwrap();

        assert!(ctx.has_variable("left"));
        assert!(ctx.has_variable("right"));
    }

    #[tokio::test]
    async fn test_failures_collected_in_child_order() {
        let ctx = TestContext::new();
        let parallel = Parallel::new()
            .action(CustomAction::new("ok", |_| Ok(())))
            .action(CustomAction::new("first-fail", |_| {
                Err(EngineError::action_failed("first-fail", "a"))
            }))
            .action(CustomAction::new("second-fail", |_| {
                Err(EngineError::action_failed("second-fail", "b"))
            }));

        let err = parallel.execute(&ctx).await.unwrap_err();
        match err {
            EngineError::Parallel { failures, total } => {
                assert_eq!(total, 3);
                assert_eq!(failures.len(), 2);
                assert!(failures[0].to_string().contains("first-fail"));
                assert!(failures[1].to_string().contains("second-fail"));
            }
            other => panic!("expected parallel error, got {other}"),
        }

        assert_eq!(parallel.last_executed().unwrap().name(), "first-fail");
    }

    #[tokio::test]
    async fn test_remaining_workers_run_to_completion() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();

        let parallel = Parallel::new()
            .action(CustomAction::new("boom", |_| {
                Err(EngineError::action_failed("boom", "kaput"))
            }))
            .action(incrementer(&counter))
            .action(incrementer(&counter));

        assert!(parallel.execute(&ctx).await.is_err());
        // The failing worker does not cancel its siblings
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
