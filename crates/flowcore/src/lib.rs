//! Core abstractions for the flow engine
//!
//! This crate provides the building blocks of a step tree: output futures
//! that can be handed out before they are computed, the input resolver, the
//! memoization cache, and the `Step`/`Node` traits. Driving a tree to
//! completion lives in `flowruntime`.

mod error;
pub mod events;
mod input;
mod memo;
mod node;
pub mod output;
mod step;
mod value;

pub use error::{FlowError, NodeError, OutputError, WorkflowError};
pub use events::*;
pub use input::{resolve_inputs, Input, InputBag, ResolvedInputs};
pub use memo::{MemoCache, MemoKey};
pub use node::{node_fn, FnNode, Node, NodeContext, NodeResult};
pub use output::{
    OutputFuture, OutputId, OutputRegistry, OutputStatus, Resolver, DEFAULT_OUTPUT_TIMEOUT,
};
pub use step::{NodeStep, Sequence, Step, StepContext, StepFuture};
pub use value::Value;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
