//! Failure reporting
//!
//! Turns the last-executed pointers a container hierarchy records during a
//! run into a readable trail pointing at the action that broke.

pub mod failure_stack;

pub use failure_stack::{failure_stack, render_failure_stack, FailureStackElement};
