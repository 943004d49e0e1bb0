//! Action and container abstractions
//!
//! Everything the engine schedules implements [`TestAction`]: an immutable
//! name plus an `execute(context)` contract. Containers own an ordered list
//! of child actions and track which child ran last, so a failure anywhere
//! in a nested tree can be attributed afterwards (see
//! [`crate::report::failure_stack`]).

pub mod condition;
pub mod eval;

pub use condition::Condition;
pub use eval::evaluate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::common::Result;
use crate::context::TestContext;

/// Source location of an action inside the scenario description it was
/// built from. Purely diagnostic; attached by whatever loads the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    pub start_line: u32,
    pub end_line: u32,
}

impl SourceSpan {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

/// A single schedulable unit of scenario behavior.
///
/// Leaf actions perform real side effects (network calls, process control,
/// UI automation) supplied by external adapters; the engine never
/// interprets them. Containers compose other actions.
#[async_trait]
pub trait TestAction: Send + Sync {
    /// Immutable action name, used in logs and failure attribution
    fn name(&self) -> &str;

    /// Optional free-text description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Source location inside the originating scenario description
    fn source_span(&self) -> Option<SourceSpan> {
        None
    }

    /// Perform the action's work against the shared context
    async fn execute(&self, context: &TestContext) -> Result<()>;

    /// Downcast hook for the failure locator's tree walk
    fn as_container(&self) -> Option<&dyn ActionContainer> {
        None
    }
}

/// An action composed of ordered child actions.
pub trait ActionContainer: TestAction {
    /// Ordered child actions; order is significant
    fn actions(&self) -> &[Arc<dyn TestAction>];

    /// Number of children
    fn count(&self) -> usize {
        self.actions().len()
    }

    /// The child most recently handed to `execute`.
    ///
    /// Recorded *before* the child runs, so it is accurate even while an
    /// error from that child is still propagating.
    fn last_executed(&self) -> Option<Arc<dyn TestAction>>;

    /// Record a child as the one about to execute
    fn set_last_executed(&self, action: Arc<dyn TestAction>);

    /// Whether this container considers its work finished.
    ///
    /// Conditional reports done when its condition evaluated false, which
    /// lets re-entrant schedulers skip it cooperatively.
    fn is_done(&self, context: &TestContext) -> bool;
}

/// Bookkeeping shared by every container implementation
pub struct ContainerState {
    last_executed: Mutex<Option<Arc<dyn TestAction>>>,
    done: AtomicBool,
}

impl ContainerState {
    pub fn new() -> Self {
        Self {
            last_executed: Mutex::new(None),
            done: AtomicBool::new(false),
        }
    }

    pub fn last_executed(&self) -> Option<Arc<dyn TestAction>> {
        self.last_executed.lock().unwrap().clone()
    }

    pub fn set_last_executed(&self, action: Arc<dyn TestAction>) {
        *self.last_executed.lock().unwrap() = Some(action);
    }

    pub fn mark_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl Default for ContainerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one child: record it as last-executed, publish it as the active
/// action, then run it. The recording happens first by contract.
pub(crate) async fn run_child(
    container: &dyn ActionContainer,
    child: &Arc<dyn TestAction>,
    context: &TestContext,
) -> Result<()> {
    container.set_last_executed(Arc::clone(child));
    context.set_active_action(child.name());
    debug!(container = container.name(), child = child.name(), "executing action");
    child.execute(context).await
}

/// Execute every child of `container` in order; the first failure aborts
/// the remaining children and propagates.
pub(crate) async fn run_children(
    container: &dyn ActionContainer,
    context: &TestContext,
) -> Result<()> {
    for index in 0..container.actions().len() {
        let child = Arc::clone(&container.actions()[index]);
        run_child(container, &child, context).await?;
    }
    Ok(())
}
