use std::sync::Arc;

use chat_summary::Editor;
use chat_summary::core::{Services, StoreClient};
use chat_summary::headless::HeadlessHost;
use chat_summary::model::{
    ChatFile, ConversationId, Message, Metadata, OwnerRef, PromptData,
};
use chat_summary_test_host::MemoryStore;
use serde_json::json;
use tokio::sync::mpsc;

fn owner() -> OwnerRef {
    OwnerRef::Group {
        id: "g1".to_owned(),
    }
}

fn summary_of(store: &MemoryStore, id: &str) -> String {
    let file = store.file(&owner(), id).unwrap();
    PromptData::from_metadata(&file.metadata).text().to_owned()
}

fn seeded_store() -> MemoryStore {
    let mut metadata = Metadata::new();
    metadata.insert("note_prompt".to_owned(), json!("keep me"));
    PromptData {
        prompt: Some("old".to_owned()),
        ..Default::default()
    }
    .write_to(&mut metadata);

    let store = MemoryStore::default();
    store.insert(
        &owner(),
        "today",
        &ChatFile {
            metadata,
            messages: vec![Message::from(json!({ "mes": "hi" }))],
        },
    );
    store.insert(&owner(), "yesterday", &ChatFile::default());
    store
}

#[tokio::test]
async fn test_edit_open_chat_is_stored() {
    let store = seeded_store();
    let (tx, _rx) = mpsc::unbounded_channel();
    let host = Arc::new(HeadlessHost::new(
        owner(),
        "Party",
        StoreClient::new(store.clone()),
        tx,
    ));
    host.load_chat(&ConversationId::new("today")).await.unwrap();

    let mut editor = Editor::new(Services::new(host.clone(), store.clone()));
    editor.start();
    let today = ConversationId::new("today");
    let yesterday = ConversationId::new("yesterday");
    let view = editor.open_view().unwrap();
    view.edit_summary(&today, "new").unwrap();
    view.select(&yesterday).await.unwrap();
    view.edit_summary(&yesterday, "the day before").unwrap();

    let report = editor.close_view().await.unwrap();
    assert!(report.is_success());
    assert_eq!(store.saved_ids(), vec![yesterday]);
    assert_eq!(summary_of(&store, "yesterday"), "the day before");

    assert!(host.flush_pending().await.unwrap());
    assert_eq!(summary_of(&store, "today"), "new");
    let file = store.file(&owner(), "today").unwrap();
    assert_eq!(file.metadata["note_prompt"], json!("keep me"));
    assert_eq!(file.messages.len(), 1);
}

#[tokio::test]
async fn test_untouched_open_chat_is_not_saved() {
    let store = seeded_store();
    let (tx, _rx) = mpsc::unbounded_channel();
    let host = Arc::new(HeadlessHost::new(
        owner(),
        "Party",
        StoreClient::new(store.clone()),
        tx,
    ));
    host.load_chat(&ConversationId::new("today")).await.unwrap();

    let mut editor = Editor::new(Services::new(host.clone(), store.clone()));
    editor.open_view().unwrap();
    editor.close_view().await.unwrap();

    assert!(!host.flush_pending().await.unwrap());
    assert!(store.saved_ids().is_empty());
}
