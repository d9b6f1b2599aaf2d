use crate::error::{FlowError, OutputError};
use crate::output::OutputFuture;
use crate::Value;
use futures::future::try_join_all;
use std::collections::BTreeMap;

/// Raw inputs of a node, keyed by input name
pub type InputBag = BTreeMap<String, Input>;

/// Inputs after every pending value has been awaited
pub type ResolvedInputs = BTreeMap<String, Value>;

/// A node input: either a value already at hand or the output of another node
#[derive(Debug, Clone)]
pub enum Input<T = Value> {
    Concrete(T),
    Pending(OutputFuture<T>),
}

impl<T: Clone + Send + Sync + 'static> Input<T> {
    pub async fn resolve(&self) -> Result<T, OutputError> {
        match self {
            Input::Concrete(value) => Ok(value.clone()),
            Input::Pending(future) => future.wait().await,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Input::Pending(_))
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Concrete(value)
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Concrete(Value::from(s))
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Concrete(Value::from(s))
    }
}

impl From<f64> for Input {
    fn from(n: f64) -> Self {
        Input::Concrete(Value::from(n))
    }
}

impl From<i64> for Input {
    fn from(n: i64) -> Self {
        Input::Concrete(Value::from(n))
    }
}

impl From<bool> for Input {
    fn from(b: bool) -> Self {
        Input::Concrete(Value::from(b))
    }
}

impl From<OutputFuture<Value>> for Input {
    fn from(future: OutputFuture<Value>) -> Self {
        Input::Pending(future)
    }
}

impl From<&OutputFuture<Value>> for Input {
    fn from(future: &OutputFuture<Value>) -> Self {
        Input::Pending(future.clone())
    }
}

/// Await every pending input concurrently.
///
/// Completes once the slowest input is available. The first failure aborts
/// the whole resolution and nothing partially resolved is returned.
pub async fn resolve_inputs(inputs: &InputBag) -> Result<ResolvedInputs, FlowError> {
    let pending = inputs.iter().map(|(key, input)| async move {
        input
            .resolve()
            .await
            .map(|value| (key.clone(), value))
            .map_err(|source| FlowError::Resolution {
                input: key.clone(),
                source,
            })
    });

    let resolved = try_join_all(pending).await?;
    Ok(resolved.into_iter().collect())
}
