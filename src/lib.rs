//! testflow: a scenario execution engine
//!
//! Scenarios are trees of [`engine::TestAction`]s: leaf actions do the
//! work, [`engine::ActionContainer`]s give the tree its control flow
//! (sequences, loops, retries, parallel fan-out, timers, templates).
//! Every action runs against a shared [`context::TestContext`] that holds
//! variables, function and matcher registries, running timers, and the
//! asynchronous error list.
//!
//! Containers record which child ran last, so when a run breaks the
//! [`report::failure_stack`] walk can point at the exact action that
//! failed, however deeply it was nested.
//!
//! ```no_run
//! use std::time::Duration;
//! use testflow::actions::{EchoAction, SleepAction};
//! use testflow::containers::{Iterate, Sequence};
//! use testflow::context::TestContext;
//! use testflow::engine::TestAction;
//!
//! # async fn run() -> testflow::Result<()> {
//! let scenario = Sequence::new()
//!     .named("warmup")
//!     .action(
//!         Iterate::new("i lt= 3")
//!             .action(EchoAction::new("round ${i}"))
//!             .action(SleepAction::new(Duration::from_millis(100))),
//!     );
//!
//! let ctx = TestContext::new();
//! scenario.execute(&ctx).await
//! # }
//! ```

pub mod actions;
pub mod common;
pub mod containers;
pub mod context;
pub mod engine;
pub mod report;

pub use common::{EngineError, ErrorKind, Result};
pub use context::TestContext;
pub use engine::{evaluate, ActionContainer, SourceSpan, TestAction};
