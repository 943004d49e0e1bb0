//! Control-flow containers
//!
//! Each container is a [`crate::engine::TestAction`] that composes other
//! actions: strict sequences, conditional branches, pre- and post-test
//! loops, retry loops, parallel fan-out, fire-and-forget forks, periodic
//! timers, parameterized templates, and expected-failure wrappers.

pub mod assert;
pub mod asynchronous;
pub mod catch;
pub mod conditional;
pub mod iterate;
pub mod parallel;
pub mod repeat;
pub mod repeat_on_error;
pub mod sequence;
pub mod template;
pub mod timer;

pub use assert::Assert;
pub use asynchronous::Async;
pub use catch::Catch;
pub use conditional::Conditional;
pub use iterate::Iterate;
pub use parallel::Parallel;
pub use repeat::RepeatUntilTrue;
pub use repeat_on_error::RepeatOnErrorUntilTrue;
pub use sequence::Sequence;
pub use template::Template;
pub use timer::Timer;
