//! Steps are the engine's unit of execution.
//!
//! A step is consumed by [`Step::execute`] and hands back the child steps the
//! execution context must run next, in order. [`NodeStep`] binds a [`Node`]
//! body to its inputs and declared outputs; [`Sequence`] simply yields its
//! children.

use crate::events::{EventBus, EventEmitter, ExecutionEvent, ExecutionId};
use crate::input::{resolve_inputs, Input, InputBag};
use crate::memo::{MemoCache, MemoKey};
use crate::node::{Node, NodeContext, NodeResult};
use crate::output::{OutputRegistry, Resolver};
use crate::{FlowError, Value};
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type StepFuture<'a> = BoxFuture<'a, Result<Vec<Box<dyn Step>>, FlowError>>;

type Continuation = Box<dyn FnOnce(&Value) -> Vec<Box<dyn Step>> + Send>;

/// A unit of work that may yield further steps
pub trait Step: Send {
    fn name(&self) -> &str;

    /// Run this step. The returned children are executed afterwards, in order.
    fn execute<'a>(self: Box<Self>, ctx: &'a StepContext) -> StepFuture<'a>;
}

/// Per-run state a step needs while it executes
#[derive(Clone)]
pub struct StepContext {
    pub execution_id: ExecutionId,
    pub depth: usize,
    outputs: Arc<OutputRegistry>,
    memo: Arc<MemoCache>,
    events: Arc<EventBus>,
}

impl StepContext {
    pub fn new(
        execution_id: ExecutionId,
        outputs: Arc<OutputRegistry>,
        memo: Arc<MemoCache>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            execution_id,
            depth: 0,
            outputs,
            memo,
            events,
        }
    }

    pub fn at_depth(&self, depth: usize) -> Self {
        Self {
            depth,
            ..self.clone()
        }
    }

    pub fn outputs(&self) -> &Arc<OutputRegistry> {
        &self.outputs
    }

    pub fn memo(&self) -> &MemoCache {
        &self.memo
    }

    pub fn emit(&self, event: ExecutionEvent) {
        self.events.emit(event);
    }

    pub fn emitter(&self, step: &str) -> EventEmitter {
        self.events.create_emitter(self.execution_id, step)
    }
}

/// A node body together with its inputs, config and declared outputs
pub struct NodeStep {
    name: String,
    node: Arc<dyn Node>,
    inputs: InputBag,
    config: BTreeMap<String, Value>,
    outputs: Vec<Resolver<Value>>,
    then: Option<Continuation>,
}

impl NodeStep {
    pub fn new(node: Arc<dyn Node>) -> Self {
        Self {
            name: node.node_type().to_string(),
            node,
            inputs: BTreeMap::new(),
            config: BTreeMap::new(),
            outputs: Vec::new(),
            then: None,
        }
    }

    /// Name used for logging and memoization; defaults to the node type
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Publish the node's output through `resolver`. May be called more than
    /// once to fan the same value out to several outputs.
    pub fn output(mut self, resolver: Resolver<Value>) -> Self {
        self.outputs.push(resolver);
        self
    }

    pub fn outputs(mut self, resolvers: impl IntoIterator<Item = Resolver<Value>>) -> Self {
        self.outputs.extend(resolvers);
        self
    }

    /// Build more children from the node's output once it is known
    pub fn then<F>(mut self, children: F) -> Self
    where
        F: FnOnce(&Value) -> Vec<Box<dyn Step>> + Send + 'static,
    {
        self.then = Some(Box::new(children));
        self
    }

    pub fn boxed(self) -> Box<dyn Step> {
        Box::new(self)
    }

    async fn run(self, ctx: &StepContext) -> Result<Vec<Box<dyn Step>>, FlowError> {
        let NodeStep {
            name,
            node,
            inputs,
            config,
            outputs,
            then,
        } = self;

        let resolved = match resolve_inputs(&inputs).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(step = %name, error = %e, "Failed to resolve node inputs");
                reject_all(&outputs, &e.to_string());
                return Err(e);
            }
        };

        let key = match MemoKey::new(&name, &config, &resolved) {
            Ok(key) => key,
            Err(e) => return Err(fail_step(&name, &outputs, e.into())),
        };
        let first_output = outputs.first().map(Resolver::future);
        if !ctx.memo().mark(key.clone(), first_output) {
            tracing::debug!(step = %name, "Node already processed with identical inputs, skipping");
            forward_memoized(ctx.memo(), &key, &outputs);
            ctx.emit(ExecutionEvent::StepSkipped {
                execution_id: ctx.execution_id,
                step: name,
                timestamp: Utc::now(),
            });
            return Ok(Vec::new());
        }

        let mut node_ctx = NodeContext::new(
            ctx.execution_id,
            name.clone(),
            ctx.emitter(&name),
            Arc::clone(ctx.outputs()),
        );
        node_ctx.inputs = resolved;
        node_ctx.config = config;
        node_ctx.declared_outputs = outputs.clone();

        let NodeResult {
            output,
            mut children,
        } = match node.execute(node_ctx).await {
            Ok(result) => result,
            Err(source) => {
                tracing::error!(
                    step = %name,
                    node_type = node.node_type(),
                    error = %source,
                    "Error in workflow step"
                );
                reject_all(&outputs, &source.to_string());
                return Err(FlowError::NodeExecution { node: name, source });
            }
        };

        if let Some(value) = output {
            ctx.memo().record(&key, &value);
            for resolver in &outputs {
                if let Err(e) = resolver.resolve(value.clone()) {
                    return Err(fail_step(&name, &outputs, e.into()));
                }
                ctx.emit(ExecutionEvent::OutputPublished {
                    execution_id: ctx.execution_id,
                    step: name.clone(),
                    output_id: resolver.id(),
                    timestamp: Utc::now(),
                });
            }
            if let Some(then) = then {
                children.extend(then(&value));
            }
        }

        Ok(children)
    }
}

impl Step for NodeStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(self: Box<Self>, ctx: &'a StepContext) -> StepFuture<'a> {
        Box::pin((*self).run(ctx))
    }
}

/// Fail every still-pending output so its consumers stop waiting.
fn reject_all(outputs: &[Resolver<Value>], message: &str) {
    for resolver in outputs {
        let _ = resolver.reject(message);
    }
}

fn fail_step(name: &str, outputs: &[Resolver<Value>], error: FlowError) -> FlowError {
    tracing::error!(step = %name, error = %error, "Error in workflow step");
    reject_all(outputs, &error.to_string());
    error
}

/// Hand a skipped invocation's outputs the value of the first one.
///
/// A first invocation that delegated its output to a child has no value yet;
/// its output is relayed once it settles.
fn forward_memoized(memo: &MemoCache, key: &MemoKey, outputs: &[Resolver<Value>]) {
    let pending: Vec<Resolver<Value>> = outputs
        .iter()
        .filter(|resolver| !resolver.is_settled())
        .cloned()
        .collect();
    if pending.is_empty() {
        return;
    }

    if let Some(value) = memo.recorded(key) {
        for resolver in &pending {
            let _ = resolver.resolve(value.clone());
        }
        return;
    }

    let Some(first) = memo.output_for(key) else {
        return;
    };
    tokio::spawn(async move {
        match first.wait().await {
            Ok(value) => {
                for resolver in &pending {
                    let _ = resolver.resolve(value.clone());
                }
            }
            Err(e) => reject_all(&pending, &e.to_string()),
        }
    });
}

/// Container step that yields its children in declaration order
pub struct Sequence {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            name: "sequence".to_string(),
            steps: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn boxed_step(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn boxed(self) -> Box<dyn Step> {
        Box::new(self)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Box<dyn Step>>> for Sequence {
    fn from(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: "sequence".to_string(),
            steps,
        }
    }
}

impl Step for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(self: Box<Self>, _ctx: &'a StepContext) -> StepFuture<'a> {
        Box::pin(async move { Ok(self.steps) })
    }
}
