use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Metadata;

/// The reserved metadata key holding [`PromptData`].
pub const METADATA_KEY: &str = "custom_prompt_injector_data";

const PROMPT_FIELD: &str = "prompt";
const MIGRATION_FIELD: &str = "migration";

/// Per-conversation data stored under [`METADATA_KEY`].
///
/// Fields this version doesn't know about are kept in `extra`, so the
/// data survives a load and save cycle unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptData {
    /// The summary text of the conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Tag linking this conversation to the other side of a migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationTag>,
    /// Any other fields found in the stored object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptData {
    /// Reads the prompt data from a metadata object.
    ///
    /// A missing entry, or one that isn't an object, reads as empty data.
    /// Fields are read one by one: a `prompt` that isn't a string or a
    /// `migration` that isn't a valid tag is kept as is in `extra`.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let Some(Value::Object(stored)) = metadata.get(METADATA_KEY) else {
            return Self::default();
        };
        let mut extra = stored.clone();

        let prompt = match extra.remove(PROMPT_FIELD) {
            Some(Value::String(prompt)) => Some(prompt),
            Some(other) => {
                extra.insert(PROMPT_FIELD.to_owned(), other);
                None
            }
            None => None,
        };
        let migration = match extra.remove(MIGRATION_FIELD) {
            Some(value) => match MigrationTag::deserialize(&value) {
                Ok(tag) => Some(tag),
                Err(_) => {
                    extra.insert(MIGRATION_FIELD.to_owned(), value);
                    None
                }
            },
            None => None,
        };

        Self {
            prompt,
            migration,
            extra,
        }
    }

    /// Returns the summary text, or an empty string if there is none.
    #[inline]
    pub fn text(&self) -> &str {
        self.prompt.as_deref().unwrap_or("")
    }

    /// Returns `true` if the summary is empty after trimming.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Converts the prompt data into its stored JSON form.
    ///
    /// Typed fields take precedence over raw ones kept in `extra`.
    pub fn to_value(&self) -> Value {
        let mut stored = self.extra.clone();
        if let Some(prompt) = &self.prompt {
            stored.insert(PROMPT_FIELD.to_owned(), Value::String(prompt.clone()));
        }
        let tag = self
            .migration
            .as_ref()
            .and_then(|tag| serde_json::to_value(tag).ok());
        if let Some(tag) = tag {
            stored.insert(MIGRATION_FIELD.to_owned(), tag);
        }
        Value::Object(stored)
    }

    /// Stores the prompt data into a metadata object, replacing any
    /// previous entry.
    #[inline]
    pub fn write_to(&self, metadata: &mut Metadata) {
        metadata.insert(METADATA_KEY.to_owned(), self.to_value());
    }
}

/// A correlation tag written to both sides of a migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MigrationTag {
    /// The conversation that was migrated from.
    Source {
        /// Name of the conversation the history was copied to.
        migrated_to: String,
        /// Correlation id shared with the destination.
        id: String,
        /// ISO-8601 time of the migration.
        timestamp: String,
    },
    /// The conversation that was created by a migration.
    Destination {
        /// Name of the conversation the history was copied from.
        migrated_from: String,
        /// Correlation id shared with the source.
        id: String,
        /// ISO-8601 time of the migration.
        timestamp: String,
    },
}

impl MigrationTag {
    /// Returns the correlation id of the migration.
    #[inline]
    pub fn correlation_id(&self) -> &str {
        match self {
            MigrationTag::Source { id, .. } => id,
            MigrationTag::Destination { id, .. } => id,
        }
    }
}
