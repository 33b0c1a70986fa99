use std::sync::Arc;

use chat_summary_model::{
    ChatFile, Message, Metadata, OwnerRef, PromptData,
};
use chat_summary_test_host::{MemoryStore, TestHost};
use serde_json::json;

pub const ACTIVE: &str = "Alice - 1";
pub const OTHER: &str = "Alice - 2";
pub const THIRD: &str = "Alice - 3";

pub fn owner() -> OwnerRef {
    OwnerRef::Character {
        name: "Alice".to_owned(),
        avatar: "alice.png".to_owned(),
    }
}

pub fn metadata_with(summary: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("note_prompt".to_owned(), json!("keep me"));
    PromptData {
        prompt: Some(summary.to_owned()),
        ..Default::default()
    }
    .write_to(&mut metadata);
    metadata
}

pub fn summary_of(metadata: &Metadata) -> String {
    PromptData::from_metadata(metadata).text().to_owned()
}

pub fn message(text: &str) -> Message {
    Message::from(json!({ "name": "Alice", "mes": text }))
}

pub fn hidden(text: &str) -> Message {
    Message::from(json!({ "name": "Alice", "mes": text, "is_system": true }))
}

/// A host with `ACTIVE` open and a store holding all three conversations.
///
/// `OTHER` has no summary, the others do. The stored copy of `ACTIVE` is
/// stale.
pub fn setup() -> (Arc<TestHost>, MemoryStore) {
    let host = TestHost::new(owner(), "Alice").with_active_chat(
        ACTIVE,
        metadata_with("active summary"),
        vec![message("hello"), message("hi")],
    );

    let store = MemoryStore::default();
    store.insert(
        &owner(),
        ACTIVE,
        &ChatFile {
            metadata: metadata_with("stale"),
            messages: vec![message("hello")],
        },
    );
    store.insert(
        &owner(),
        OTHER,
        &ChatFile {
            metadata: Metadata::new(),
            messages: vec![message("first")],
        },
    );
    store.insert(
        &owner(),
        THIRD,
        &ChatFile {
            metadata: metadata_with("third summary"),
            messages: vec![message("second")],
        },
    );
    (Arc::new(host), store)
}
