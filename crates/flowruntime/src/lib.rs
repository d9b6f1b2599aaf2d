//! Step tree execution runtime
//!
//! This crate provides the execution context that walks a step tree,
//! running each step and then its children in order, plus a small runtime
//! facade that shares one event bus across runs.

mod executor;
mod runtime;

pub use executor::{ExecutionContext, RunSummary};
pub use runtime::{FlowRuntime, RuntimeConfig};
