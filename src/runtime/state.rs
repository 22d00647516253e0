//! Reactive per-screen state store.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::watch;

use crate::manifest::StateField;
use crate::utils::json_path::{PathError, PathMapper};

/// Screen state backed by a `watch` channel; hosts subscribe to re-render.
#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<Value>,
}

impl StateStore {
    pub fn new(initial: Value) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Initial state from declared typed defaults.
    pub fn from_declared(fields: &BTreeMap<String, StateField>) -> Self {
        let initial: Map<String, Value> = fields
            .iter()
            .map(|(key, field)| (key.clone(), field.initial_value()))
            .collect();
        Self::new(Value::Object(initial))
    }

    pub fn snapshot(&self) -> Value {
        self.tx.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        PathMapper::get_path(&self.tx.borrow(), key).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Value> {
        self.tx.subscribe()
    }

    /// Write `value` at a dotted key (`form.title`). Subscribers are only
    /// notified when the write succeeds.
    pub fn set(&self, key: &str, value: Value) -> Result<(), PathError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| match PathMapper::set_path(state, key, value) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }

    /// Replace the whole state.
    pub fn reset(&self, state: Value) {
        self.tx.send_replace(state);
    }
}
