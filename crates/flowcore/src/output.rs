//! Output futures: values that are handed to consumers before they exist.
//!
//! An [`OutputRegistry`] creates `(OutputFuture, Resolver)` pairs. The
//! resolver supplies the value exactly once; every clone of the future
//! observes that same value. Each output carries a deadline, and an output
//! still pending when it passes settles as [`OutputError::Timeout`] so a
//! node that never resolves its output cannot stall the run.

use crate::error::OutputError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// How long an output may stay pending before it fails with a timeout.
pub const DEFAULT_OUTPUT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Identifier of an output, unique within its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId(u64);

impl OutputId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStatus {
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone)]
enum OutputState<T> {
    Pending,
    Resolved(T),
    Failed(OutputError),
}

impl<T> OutputState<T> {
    fn is_pending(&self) -> bool {
        matches!(self, OutputState::Pending)
    }

    fn status(&self) -> OutputStatus {
        match self {
            OutputState::Pending => OutputStatus::Pending,
            OutputState::Resolved(_) => OutputStatus::Resolved,
            OutputState::Failed(_) => OutputStatus::Failed,
        }
    }
}

impl<T: Clone> OutputState<T> {
    fn to_result(&self) -> Option<Result<T, OutputError>> {
        match self {
            OutputState::Pending => None,
            OutputState::Resolved(value) => Some(Ok(value.clone())),
            OutputState::Failed(err) => Some(Err(err.clone())),
        }
    }
}

struct OutputCell<T> {
    id: OutputId,
    timeout: Duration,
    deadline: Instant,
    state: watch::Sender<OutputState<T>>,
}

impl<T> OutputCell<T> {
    fn timeout_error(&self) -> OutputError {
        OutputError::Timeout {
            id: self.id,
            waited_ms: self.timeout.as_millis() as u64,
        }
    }

    /// Pending -> Failed(Timeout). Only the first caller wins.
    fn expire(&self) {
        let err = self.timeout_error();
        let fired = self.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = OutputState::Failed(err);
                true
            } else {
                false
            }
        });
        if fired {
            tracing::warn!(
                output = %self.id,
                waited_ms = self.timeout.as_millis() as u64,
                "Output timed out waiting for resolution"
            );
        }
    }

    fn expire_if_overdue(&self) {
        if Instant::now() >= self.deadline {
            self.expire();
        }
    }

    fn status(&self) -> OutputStatus {
        self.expire_if_overdue();
        self.state.borrow().status()
    }

    fn settle(&self, next: OutputState<T>) -> Result<(), OutputError> {
        self.expire_if_overdue();

        let id = self.id;
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match state {
            OutputState::Pending => {
                *state = next;
                true
            }
            OutputState::Resolved(_) => {
                outcome = Err(OutputError::DoubleResolution { id });
                false
            }
            OutputState::Failed(err) => {
                outcome = Err(err.clone());
                false
            }
        });
        outcome
    }
}

impl<T: Clone> OutputCell<T> {
    fn snapshot(&self) -> Option<Result<T, OutputError>> {
        self.expire_if_overdue();
        self.state.borrow().to_result()
    }
}

trait OutputSlot: Send + Sync {
    fn status(&self) -> OutputStatus;
}

impl<T: Send + Sync> OutputSlot for OutputCell<T> {
    fn status(&self) -> OutputStatus {
        OutputCell::status(self)
    }
}

/// Consumer half of an output. Cheap to clone; all clones see the same value.
pub struct OutputFuture<T> {
    cell: Arc<OutputCell<T>>,
}

impl<T> Clone for OutputFuture<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> OutputFuture<T> {
    pub fn id(&self) -> OutputId {
        self.cell.id
    }

    /// Wait until the output settles or its deadline passes.
    pub async fn wait(&self) -> Result<T, OutputError> {
        let mut rx = self.cell.state.subscribe();
        let settled = tokio::time::timeout_at(self.cell.deadline, async {
            rx.wait_for(|state| !state.is_pending())
                .await
                .ok()
                .and_then(|state| state.to_result())
        })
        .await;

        match settled {
            Ok(Some(result)) => result,
            Ok(None) => self
                .cell
                .snapshot()
                .unwrap_or_else(|| Err(self.cell.timeout_error())),
            Err(_elapsed) => {
                self.cell.expire();
                self.cell
                    .snapshot()
                    .unwrap_or_else(|| Err(self.cell.timeout_error()))
            }
        }
    }

    /// Current value without waiting, `None` while still pending.
    pub fn try_get(&self) -> Option<Result<T, OutputError>> {
        self.cell.snapshot()
    }

    pub fn status(&self) -> OutputStatus {
        self.cell.status()
    }
}

impl<T> fmt::Debug for OutputFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputFuture")
            .field("id", &self.cell.id)
            .field("status", &self.cell.status())
            .finish()
    }
}

/// Producer half of an output. Resolving it more than once is an error.
pub struct Resolver<T> {
    cell: Arc<OutputCell<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Resolver<T> {
    pub fn id(&self) -> OutputId {
        self.cell.id
    }

    /// Supply the value and wake every awaiter.
    ///
    /// Fails with `DoubleResolution` if a value was already supplied, or with
    /// the stored failure if the output already timed out or was rejected.
    pub fn resolve(&self, value: T) -> Result<(), OutputError> {
        self.cell.settle(OutputState::Resolved(value))?;
        tracing::trace!(output = %self.cell.id, "Output resolved");
        Ok(())
    }

    /// Fail the output so awaiters stop waiting on it.
    pub fn reject(&self, message: impl Into<String>) -> Result<(), OutputError> {
        let err = OutputError::Upstream {
            id: self.cell.id,
            message: message.into(),
        };
        self.cell.settle(OutputState::Failed(err))
    }

    pub fn is_settled(&self) -> bool {
        self.status() != OutputStatus::Pending
    }

    pub fn status(&self) -> OutputStatus {
        self.cell.status()
    }

    /// The consumer half paired with this resolver.
    pub fn future(&self) -> OutputFuture<T> {
        OutputFuture {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("id", &self.cell.id)
            .field("status", &self.cell.status())
            .finish()
    }
}

/// Table of outputs created during one run
pub struct OutputRegistry {
    next_id: AtomicU64,
    timeout: Duration,
    entries: DashMap<OutputId, Arc<dyn OutputSlot>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_OUTPUT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            timeout,
            entries: DashMap::new(),
        }
    }

    /// Create a pending output and start its deadline.
    pub fn create<T: Clone + Send + Sync + 'static>(&self) -> (OutputFuture<T>, Resolver<T>) {
        let id = OutputId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (state, _) = watch::channel(OutputState::Pending);
        let cell = Arc::new(OutputCell {
            id,
            timeout: self.timeout,
            deadline: Instant::now() + self.timeout,
            state,
        });

        self.entries
            .insert(id, Arc::clone(&cell) as Arc<dyn OutputSlot>);
        tracing::trace!(output = %id, "Output created");

        (
            OutputFuture {
                cell: Arc::clone(&cell),
            },
            Resolver { cell },
        )
    }

    pub fn status(&self, id: OutputId) -> Option<OutputStatus> {
        self.entries.get(&id).map(|slot| slot.status())
    }

    /// Ids of outputs that have neither resolved nor failed yet
    pub fn pending(&self) -> Vec<OutputId> {
        let mut ids: Vec<OutputId> = self
            .entries
            .iter()
            .filter(|entry| entry.value().status() == OutputStatus::Pending)
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        ids
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::new()
    }
}
