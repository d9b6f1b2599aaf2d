use crate::runtime::RuntimeConfig;
use chrono::Utc;
use flowcore::{
    EventBus, ExecutionEvent, ExecutionId, FlowError, MemoCache, OutputFuture, OutputId,
    OutputRegistry, Resolver, Step, StepContext, WorkflowError,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Drives one step tree to completion.
///
/// Owns the output registry and memo cache for its runs. Children returned
/// by a step run sequentially, depth-first, in the order they were returned.
pub struct ExecutionContext {
    execution_id: ExecutionId,
    max_depth: Option<usize>,
    outputs: Arc<OutputRegistry>,
    memo: Arc<MemoCache>,
    event_bus: Arc<EventBus>,
    running: AtomicBool,
}

impl ExecutionContext {
    pub fn new(config: &RuntimeConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            execution_id: ExecutionId::new_v4(),
            max_depth: config.max_depth,
            outputs: Arc::new(OutputRegistry::with_timeout(config.output_timeout)),
            memo: Arc::new(MemoCache::new()),
            event_bus,
            running: AtomicBool::new(false),
        }
    }

    /// Context with its own event bus, for callers that don't need events
    pub fn with_config(config: &RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self::new(config, event_bus)
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Declare an output before the step that computes it has run
    pub fn create_output<T>(&self) -> (OutputFuture<T>, Resolver<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.outputs.create()
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn memo(&self) -> &MemoCache {
        &self.memo
    }

    /// Execute `root` and everything it yields.
    ///
    /// The first error aborts the run and is returned as-is; outputs resolved
    /// before it keep their values. The memo cache is cleared when the run
    /// ends either way.
    pub async fn run(&self, root: Box<dyn Step>) -> Result<RunSummary, FlowError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(WorkflowError::AlreadyRunning.into());
        }
        let _running = RunningGuard(&self.running);

        let start_time = Instant::now();
        let hits_before = self.memo.hits();

        self.event_bus.emit(ExecutionEvent::RunStarted {
            execution_id: self.execution_id,
            timestamp: Utc::now(),
        });
        tracing::info!(execution_id = %self.execution_id, root = root.name(), "Starting step tree execution");

        let mut stats = TraversalStats::default();
        let result = self.drive(root, &mut stats).await;
        self.memo.clear();

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let unresolved_outputs = self.outputs.pending();
        for id in &unresolved_outputs {
            tracing::warn!(execution_id = %self.execution_id, output = %id, "Output still pending at end of run");
        }

        self.event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id: self.execution_id,
            success: result.is_ok(),
            steps_executed: stats.steps_executed,
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    execution_id = %self.execution_id,
                    steps = stats.steps_executed,
                    duration_ms,
                    "Step tree completed"
                );
                Ok(RunSummary {
                    execution_id: self.execution_id,
                    steps_executed: stats.steps_executed,
                    steps_skipped: self.memo.hits() - hits_before,
                    max_depth: stats.max_depth,
                    duration_ms,
                    unresolved_outputs,
                })
            }
            Err(e) => {
                tracing::info!(execution_id = %self.execution_id, error = %e, "Step tree failed");
                Err(e)
            }
        }
    }

    async fn drive(&self, root: Box<dyn Step>, stats: &mut TraversalStats) -> Result<(), FlowError> {
        let base = StepContext::new(
            self.execution_id,
            Arc::clone(&self.outputs),
            Arc::clone(&self.memo),
            Arc::clone(&self.event_bus),
        );

        // Children are pushed in reverse so the first child is popped first.
        let mut stack: Vec<(Box<dyn Step>, usize)> = vec![(root, 0)];

        while let Some((step, depth)) = stack.pop() {
            if let Some(limit) = self.max_depth {
                if depth > limit {
                    return Err(WorkflowError::DepthExceeded { limit }.into());
                }
            }

            let name = step.name().to_string();
            let ctx = base.at_depth(depth);

            tracing::debug!(step = %name, depth, "Executing step");
            self.event_bus.emit(ExecutionEvent::StepStarted {
                execution_id: self.execution_id,
                step: name.clone(),
                depth,
                timestamp: Utc::now(),
            });

            let start = Instant::now();
            let children = match step.execute(&ctx).await {
                Ok(children) => children,
                Err(e) => {
                    self.event_bus.emit(ExecutionEvent::StepFailed {
                        execution_id: self.execution_id,
                        step: name,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e);
                }
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            stats.steps_executed += 1;
            stats.max_depth = stats.max_depth.max(depth);

            tracing::debug!(step = %name, children = children.len(), duration_ms, "Step completed");
            self.event_bus.emit(ExecutionEvent::StepCompleted {
                execution_id: self.execution_id,
                step: name,
                children: children.len(),
                duration_ms,
                timestamp: Utc::now(),
            });

            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }

        Ok(())
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct TraversalStats {
    steps_executed: usize,
    max_depth: usize,
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub execution_id: ExecutionId,
    pub steps_executed: usize,
    /// Node invocations skipped because an identical one already ran
    pub steps_skipped: usize,
    /// Deepest level reached; the root is at depth 0
    pub max_depth: usize,
    pub duration_ms: u64,
    /// Outputs created on this context that never settled
    pub unresolved_outputs: Vec<OutputId>,
}
