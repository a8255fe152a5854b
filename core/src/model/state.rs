use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot of control selections owned by the UI layer.
///
/// Values are kept raw and read through each control's selector at
/// resolution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlState {
    values: BTreeMap<String, Value>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, control_id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(control_id.into(), value.into());
        self
    }

    pub fn set(&mut self, control_id: impl Into<String>, value: Value) {
        self.values.insert(control_id.into(), value);
    }

    pub fn get(&self, control_id: &str) -> Option<&Value> {
        self.values.get(control_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ControlState {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
