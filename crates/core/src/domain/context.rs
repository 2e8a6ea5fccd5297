use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-session conversational state carried between turns.
///
/// Serialises as the bare JSON object the conversational service expects,
/// so it can be sent upstream and returned to the browser unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionContext(Map<String, Value>);

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True only when `key` holds the JSON boolean `true`; `1` or `"true"` do not count.
    pub fn flag_is_true(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SessionContext {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}
