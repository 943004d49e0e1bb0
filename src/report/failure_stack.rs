use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;

use crate::engine::{ActionContainer, SourceSpan, TestAction};

/// One level of the failure trail: a container's last-executed child at
/// the moment the run broke.
#[derive(Debug, Clone, Serialize)]
pub struct FailureStackElement {
    /// Human-readable locator, `at <test>(<action>:<line>)`.
    pub stack_message: String,
    pub action_name: String,
    pub span: Option<SourceSpan>,
}

impl FailureStackElement {
    fn new(test_name: &str, action: &dyn TestAction) -> Self {
        let span = action.source_span();
        let line = span.map(|s| s.start_line).unwrap_or(0);
        Self {
            stack_message: format!("at {test_name}({}:{line})", action.name()),
            action_name: action.name().to_string(),
            span,
        }
    }
}

/// Walks the last-executed chain from the root container down to the
/// deepest action that was running when the failure happened. The result
/// is ordered outermost first; the final element names the failed action
/// itself.
///
/// Containers record their last-executed child before the child runs, so
/// the chain is intact even when the failure was a panic-free early
/// return deep inside nested flows.
pub fn failure_stack(test_name: &str, root: &dyn ActionContainer) -> Vec<FailureStackElement> {
    let mut stack = Vec::new();
    let mut current: Option<Arc<dyn TestAction>> = root.last_executed();

    while let Some(action) = current {
        stack.push(FailureStackElement::new(test_name, action.as_ref()));
        current = action.as_container().and_then(|c| c.last_executed());
    }

    stack
}

/// Renders the trail for terminal output, deepest frame highlighted.
pub fn render_failure_stack(elements: &[FailureStackElement]) -> String {
    let mut lines = Vec::with_capacity(elements.len());
    for (depth, element) in elements.iter().enumerate() {
        let indent = "  ".repeat(depth);
        let line = if depth + 1 == elements.len() {
            format!("{indent}{}", element.stack_message.red().bold())
        } else {
            format!("{indent}{}", element.stack_message.red())
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{CustomAction, FailAction};
    use crate::containers::Sequence;
    use crate::context::TestContext;
    use crate::engine::TestAction;

    #[tokio::test]
    async fn test_trail_points_at_the_deepest_failed_action() {
        let ctx = TestContext::new();
        let root = Sequence::new()
            .named("outer")
            .span(1, 20)
            .action(CustomAction::new("setup", |_| Ok(())).span(2, 2))
            .action(
                Sequence::new()
                    .named("inner")
                    .span(3, 10)
                    .action(FailAction::new("deliberate").span(5, 5)),
            );

        assert!(root.execute(&ctx).await.is_err());

        let stack = failure_stack("checkout-test", &root);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].stack_message, "at checkout-test(inner:3)");
        assert_eq!(stack[1].stack_message, "at checkout-test(fail:5)");
    }

    #[tokio::test]
    async fn test_trail_is_empty_before_anything_ran() {
        let root = Sequence::new().named("untouched");
        assert!(failure_stack("t", &root).is_empty());
    }

    #[tokio::test]
    async fn test_render_indents_by_depth() {
        let ctx = TestContext::new();
        let root = Sequence::new()
            .named("outer")
            .action(FailAction::new("stop").span(4, 4));
        assert!(root.execute(&ctx).await.is_err());

        let rendered = render_failure_stack(&failure_stack("t", &root));
        assert!(rendered.contains("at t(fail:4)"));
    }

    #[tokio::test]
    async fn test_missing_span_falls_back_to_line_zero() {
        let ctx = TestContext::new();
        let root = Sequence::new().action(FailAction::new("stop"));
        assert!(root.execute(&ctx).await.is_err());

        let stack = failure_stack("t", &root);
        assert_eq!(stack[0].stack_message, "at t(fail:0)");
    }
}
