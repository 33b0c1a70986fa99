use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata of a conversation, as a free-form JSON object.
pub type Metadata = Map<String, Value>;

const HIDDEN_FLAG: &str = "is_system";

/// A chat message owned by the host.
///
/// Messages are opaque to the extension, which only copies them around
/// verbatim. Cloning a message produces an independent deep copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    /// Returns `true` if the host has explicitly hidden this message.
    ///
    /// Only a literal `true` counts; missing or non-boolean flags leave
    /// the message visible.
    #[inline]
    pub fn is_system_hidden(&self) -> bool {
        matches!(self.0.get(HIDDEN_FLAG), Some(Value::Bool(true)))
    }

    /// Returns the raw JSON value of this message.
    #[inline]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Converts the message into its raw JSON value.
    #[inline]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Message {
    #[inline]
    fn from(value: Value) -> Self {
        Self(value)
    }
}
