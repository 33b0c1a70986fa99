use serde_json::{Map, Value};

use crate::{Message, Metadata};

/// The key under which the metadata envelope refers to itself.
pub const SELF_REF_KEY: &str = "chat_metadata";

/// The contents of one stored conversation.
///
/// On the wire, a conversation is an ordered list of records. The first
/// record is a metadata envelope, and every following record is a
/// message. The envelope repeats the metadata under [`SELF_REF_KEY`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatFile {
    /// The conversation metadata.
    pub metadata: Metadata,
    /// The messages, in order.
    pub messages: Vec<Message>,
}

impl ChatFile {
    /// Decodes a conversation from its stored records.
    ///
    /// A first record that is a plain object is the metadata envelope,
    /// unless it is recognizably a message. In that case, and when the
    /// first record is not an object at all, every record is a message
    /// and the metadata is empty.
    pub fn from_records(records: Vec<Value>) -> Self {
        let mut records = records.into_iter();
        let mut metadata = Metadata::new();
        let mut messages = Vec::new();

        match records.next() {
            Some(Value::Object(header)) if !is_message_record(&header) => {
                metadata = unwrap_envelope(header);
            }
            Some(first) => messages.push(Message::from(first)),
            None => {}
        }
        messages.extend(records.map(Message::from));

        Self { metadata, messages }
    }

    /// Encodes the conversation into records for storage.
    pub fn to_records(&self) -> Vec<Value> {
        let mut header = self.metadata.clone();
        header.insert(
            SELF_REF_KEY.to_owned(),
            Value::Object(self.metadata.clone()),
        );

        let mut records = Vec::with_capacity(self.messages.len() + 1);
        records.push(Value::Object(header));
        records.extend(self.messages.iter().map(|msg| msg.as_value().clone()));
        records
    }
}

#[inline]
fn is_message_record(record: &Map<String, Value>) -> bool {
    record.contains_key("mes") && !record.contains_key(SELF_REF_KEY)
}

fn unwrap_envelope(header: Map<String, Value>) -> Metadata {
    match header.get(SELF_REF_KEY) {
        Some(Value::Object(inner)) => inner.clone(),
        _ => header,
    }
}
