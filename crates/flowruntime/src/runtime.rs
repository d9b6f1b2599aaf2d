use crate::executor::{ExecutionContext, RunSummary};
use flowcore::{EventBus, ExecutionEvent, FlowError, Step, DEFAULT_OUTPUT_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;

/// Main entry point for running step trees
pub struct FlowRuntime {
    config: RuntimeConfig,
    event_bus: Arc<EventBus>,
}

impl FlowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self { config, event_bus }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Fresh context for one run; declare outputs on it, then call `run`
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(&self.config, Arc::clone(&self.event_bus))
    }

    /// Run a tree that declares all of its outputs internally
    pub async fn execute(&self, root: Box<dyn Step>) -> Result<RunSummary, FlowError> {
        self.context().run(root).await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long an output may stay pending before it fails
    pub output_timeout: Duration,
    /// Optional guard against trees that keep yielding themselves
    pub max_depth: Option<usize>,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            output_timeout: DEFAULT_OUTPUT_TIMEOUT,
            max_depth: None,
            event_buffer_size: 1000,
        }
    }
}
