use crate::input::ResolvedInputs;
use crate::output::OutputFuture;
use crate::Value;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of a node invocation: step name, static config and resolved inputs.
///
/// Built only from resolved values, so two invocations with structurally
/// equal inputs produce the same key regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoKey(String);

#[derive(Serialize)]
struct KeyParts<'a> {
    node: &'a str,
    config: &'a BTreeMap<String, Value>,
    inputs: &'a ResolvedInputs,
}

impl MemoKey {
    pub fn new(
        node: &str,
        config: &BTreeMap<String, Value>,
        inputs: &ResolvedInputs,
    ) -> Result<Self, serde_json::Error> {
        let parts = KeyParts {
            node,
            config,
            inputs,
        };
        serde_json::to_string(&parts).map(MemoKey)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct MemoEntry {
    /// Value the first invocation's body returned, once known
    value: Option<Value>,
    /// First output the invocation declared; settles later when delegated
    output: Option<OutputFuture<Value>>,
}

/// Per-pass record of node invocations that already ran
#[derive(Default)]
pub struct MemoCache {
    entries: DashMap<MemoKey, MemoEntry>,
    hits: AtomicUsize,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, key: &MemoKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Mark `key` as processed. Returns `false` (and counts a hit) when it
    /// was already marked in this pass.
    pub fn mark(&self, key: MemoKey, output: Option<OutputFuture<Value>>) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(MemoEntry {
                    value: None,
                    output,
                });
                true
            }
        }
    }

    /// Remember the value the invocation under `key` produced. The first
    /// recorded value wins.
    pub fn record(&self, key: &MemoKey, value: &Value) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.value.is_none() {
                entry.value = Some(value.clone());
            }
        }
    }

    /// Value recorded for `key` in this pass
    pub fn recorded(&self, key: &MemoKey) -> Option<Value> {
        self.entries.get(key).and_then(|entry| entry.value.clone())
    }

    /// Output declared by the first invocation under `key`, if it declared one
    pub fn output_for(&self, key: &MemoKey) -> Option<OutputFuture<Value>> {
        self.entries.get(key).and_then(|entry| entry.output.clone())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}
