//! Leaf actions
//!
//! The small built-in actions a scenario is assembled from. Anything more
//! elaborate plugs in through [`CustomAction`] or a hand-rolled
//! [`crate::engine::TestAction`] implementation.

pub mod create_variables;
pub mod custom;
pub mod echo;
pub mod fail;
pub mod sleep;

pub use create_variables::CreateVariablesAction;
pub use custom::CustomAction;
pub use echo::EchoAction;
pub use fail::FailAction;
pub use sleep::SleepAction;
