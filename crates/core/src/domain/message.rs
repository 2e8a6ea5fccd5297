use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::context::SessionContext;

/// Body of `POST /api/message`. Both `input` and `input.text` may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub input: Option<MessageInput>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageInput {
    #[serde(default)]
    pub text: Option<String>,
}

impl IncomingMessage {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self { input: Some(MessageInput { text: Some(text.into()) }) }
    }

    pub fn utterance(&self) -> &str {
        self.input.as_ref().and_then(|input| input.text.as_deref()).unwrap_or_default()
    }
}

/// A message turn sent to the conversational service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationRequest {
    #[serde(skip)]
    pub workspace_id: String,
    pub input: ConversationInput,
    pub context: SessionContext,
    pub alternate_intents: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationInput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), extra: Map::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub intent: String,
    pub confidence: f64,
}

/// Reply text; the service sends a list of lines, rewritten replies are a single string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputText {
    Single(String),
    Lines(Vec<String>),
}

impl Default for OutputText {
    fn default() -> Self {
        Self::Lines(Vec::new())
    }
}

impl OutputText {
    pub fn char_len(&self) -> usize {
        match self {
            Self::Single(text) => text.chars().count(),
            Self::Lines(lines) => lines.iter().map(|line| line.chars().count()).sum(),
        }
    }
}

impl From<&str> for OutputText {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: OutputText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationOutput {
    /// Whether `action` names `marker`: a substring of a string action, an
    /// element of a list action, or a key of an object action.
    pub fn action_contains(&self, marker: &str) -> bool {
        match &self.action {
            Some(Value::String(action)) => action.contains(marker),
            Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(marker)),
            Some(Value::Object(map)) => map.contains_key(marker),
            _ => false,
        }
    }
}

/// Reply from the conversational service; after augmentation it is also the
/// payload returned to the browser. Fields we do not model are kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub intents: Vec<Intent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: ConversationInput,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: ConversationOutput,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: SessionContext,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationResponse {
    pub fn top_confidence(&self) -> Option<f64> {
        self.intents.first().map(|intent| intent.confidence)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
