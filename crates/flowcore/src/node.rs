use crate::events::{EventEmitter, ExecutionId};
use crate::input::ResolvedInputs;
use crate::output::{OutputFuture, OutputRegistry, Resolver};
use crate::step::Step;
use crate::{NodeError, Value};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Body of a workflow node
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique type identifier (e.g., "debug.log", "transform.template")
    fn node_type(&self) -> &str;

    /// Run the node against its resolved inputs
    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError>;
}

/// Everything a node body gets to see when it runs
pub struct NodeContext {
    pub execution_id: ExecutionId,

    /// Name of the step running this node
    pub step: String,

    /// Input values, all already resolved
    pub inputs: ResolvedInputs,

    /// Static configuration for this node
    pub config: BTreeMap<String, Value>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Resolvers the step will publish the returned output to.
    ///
    /// A composite node that returns no output of its own may hand these to
    /// one of its children instead.
    pub declared_outputs: Vec<Resolver<Value>>,

    registry: Arc<OutputRegistry>,
}

impl NodeContext {
    pub fn new(
        execution_id: ExecutionId,
        step: impl Into<String>,
        events: EventEmitter,
        registry: Arc<OutputRegistry>,
    ) -> Self {
        Self {
            execution_id,
            step: step.into(),
            inputs: BTreeMap::new(),
            config: BTreeMap::new(),
            events,
            declared_outputs: Vec::new(),
            registry,
        }
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get a required string input
    pub fn input_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_input(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }

    /// Declare a new output for a step of the sub-tree this node returns
    pub fn create_output(&self) -> (OutputFuture<Value>, Resolver<Value>) {
        self.registry.create()
    }

    /// Take the declared resolvers so a child step can publish them
    pub fn take_declared_outputs(&mut self) -> Vec<Resolver<Value>> {
        std::mem::take(&mut self.declared_outputs)
    }
}

/// What a node body hands back: an optional output and a sub-tree to run
#[derive(Default)]
pub struct NodeResult {
    /// Published to the step's declared outputs
    pub output: Option<Value>,

    /// Executed in order after this node, before its later siblings
    pub children: Vec<Box<dyn Step>>,
}

impl NodeResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal result carrying only a value
    pub fn output(value: impl Into<Value>) -> Self {
        Self {
            output: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// Composite result: a sub-tree and no output of its own
    pub fn tree(children: Vec<Box<dyn Step>>) -> Self {
        Self {
            output: None,
            children,
        }
    }

    pub fn with_output(mut self, value: impl Into<Value>) -> Self {
        self.output = Some(value.into());
        self
    }

    pub fn with_child(mut self, step: impl Step + 'static) -> Self {
        self.children.push(Box::new(step));
        self
    }
}

/// Node whose body is an async closure
pub struct FnNode<F> {
    node_type: String,
    body: F,
}

impl<F> FnNode<F> {
    pub fn new(node_type: impl Into<String>, body: F) -> Self {
        Self {
            node_type: node_type.into(),
            body,
        }
    }
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeResult, NodeError>> + Send + 'static,
{
    fn node_type(&self) -> &str {
        &self.node_type
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        (self.body)(ctx).await
    }
}

/// Build a shareable node from an async closure
pub fn node_fn<F, Fut>(node_type: impl Into<String>, body: F) -> Arc<dyn Node>
where
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeResult, NodeError>> + Send + 'static,
{
    Arc::new(FnNode::new(node_type, body))
}
