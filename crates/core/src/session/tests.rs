use std::time::Duration;

use chat_summary_model::{
    CancelReason, ChatFile, ConversationId, Host, InputKind, METADATA_KEY,
    Metadata, OwnerRef,
};
use chat_summary_test_host::{MemoryStore, ScriptedInput, TestHost};
use serde_json::json;

use super::*;
use crate::ErrorKind;
use crate::testing::{self, ACTIVE, OTHER, THIRD};

fn open() -> (Arc<TestHost>, MemoryStore, ViewSession) {
    let (host, store) = testing::setup();
    let services = Services::new(host.clone(), store.clone());
    let session = ViewSession::open(services).unwrap();
    (host, store, session)
}

#[test]
fn test_open_seeds_from_live_state() {
    let (_host, store, session) = open();

    let active = ConversationId::new(ACTIVE);
    assert_eq!(session.viewing(), &active);
    let record = session.get(&active).unwrap();
    assert_eq!(record.summary(), "active summary");
    assert_eq!(record.messages().len(), 2);
    assert!(store.fetched_ids().is_empty());
    assert!(!session.is_loading());
}

#[test]
fn test_open_without_active_chat() {
    let host = Arc::new(TestHost::new(testing::owner(), "Alice"));
    let services = Services::new(host, MemoryStore::default());
    let err = ViewSession::open(services).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_sessions_have_distinct_tokens() {
    let (_, _, first) = open();
    let (_, _, second) = open();
    assert_ne!(first.token(), second.token());
}

#[tokio::test]
async fn test_select_fetches_once() {
    let (_host, store, mut session) = open();

    let other = ConversationId::new(OTHER);
    session.select(&other).await.unwrap();
    session.select(&other).await.unwrap();
    assert_eq!(session.viewing(), &other);
    assert_eq!(store.fetched_ids(), vec![other.clone()]);

    // The active conversation is never fetched.
    session.select(&ConversationId::new(ACTIVE)).await.unwrap();
    assert_eq!(store.fetched_ids(), vec![other]);
}

#[tokio::test]
async fn test_messages_only_file() {
    let (_host, store, mut session) = open();
    store.insert_records(
        &testing::owner(),
        "Alice - 4",
        vec![
            json!({ "name": "Alice", "mes": "first" }),
            json!({ "name": "Bob", "mes": "second" }),
        ],
    );

    let id = ConversationId::new("Alice - 4");
    session.select(&id).await.unwrap();
    let record = session.get(&id).unwrap();
    assert!(record.metadata().is_empty());
    assert_eq!(record.messages().len(), 2);
    assert!(!record.has_summary());

    session.edit_summary(&id, "added").unwrap();
    assert!(session.close().await.is_success());

    // Saving adds the metadata record in front of the messages.
    let records = store.records(&testing::owner(), "Alice - 4").unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records[0]["chat_metadata"][METADATA_KEY]["prompt"],
        json!("added")
    );
    assert_eq!(records[1]["mes"], json!("first"));
    assert_eq!(records[2]["mes"], json!("second"));
}

#[tokio::test]
async fn test_select_missing() {
    let (_host, _store, mut session) = open();
    let err = session
        .select(&ConversationId::new("Alice - 9"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(session.viewing(), &ConversationId::new(ACTIVE));
}

#[test]
fn test_edit_active_applies_immediately() {
    let (host, _store) = testing::setup();
    let host = Arc::new(
        Arc::into_inner(host)
            .unwrap()
            .with_template("<summary>{{总结}}</summary>"),
    );
    let services = Services::new(host.clone(), MemoryStore::default());
    let mut session = ViewSession::open(services).unwrap();

    let active = ConversationId::new(ACTIVE);
    session.edit_summary(&active, "new").unwrap();
    assert!(session.is_dirty(&active));
    assert_eq!(
        host.injected_text().as_deref(),
        Some("<summary>new</summary>")
    );
    // Live metadata is only written on flush.
    assert_eq!(
        testing::summary_of(&host.live_metadata()),
        "active summary"
    );
}

#[tokio::test]
async fn test_edit_other_leaves_injection() {
    let (host, _store, mut session) = open();
    let other = ConversationId::new(OTHER);
    session.select(&other).await.unwrap();

    session.edit_summary(&other, "not injected").unwrap();
    assert!(session.is_dirty(&other));
    assert!(host.injections().is_empty());
    assert_eq!(session.get(&other).unwrap().summary(), "not injected");
}

#[test]
fn test_edit_uncached() {
    let (_host, _store, mut session) = open();
    let err = session
        .edit_summary(&ConversationId::new(OTHER), "text")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(session.dirty_ids().count(), 0);
}

#[test]
fn test_edit_keeps_other_metadata() {
    let (_host, _store, mut session) = open();
    let active = ConversationId::new(ACTIVE);
    session.edit_summary(&active, "").unwrap();

    let record = session.get(&active).unwrap();
    assert_eq!(record.summary(), "");
    assert!(!record.has_summary());
    assert_eq!(record.metadata()["note_prompt"], "keep me");
}

#[test]
fn test_append_summary() {
    let (_host, _store, mut session) = open();
    let active = ConversationId::new(ACTIVE);

    assert!(!session.append_summary(&active, "  ").unwrap());
    assert!(!session.is_dirty(&active));

    assert!(session.append_summary(&active, " more \n").unwrap());
    assert_eq!(
        session.get(&active).unwrap().summary(),
        "active summary\n\nmore"
    );

    session.edit_summary(&active, " \n").unwrap();
    assert!(session.append_summary(&active, "fresh").unwrap());
    assert_eq!(session.get(&active).unwrap().summary(), "fresh");
}

#[tokio::test]
async fn test_listing_order_after_prefetch() {
    let (_host, store, mut session) = open();
    assert_eq!(session.listing().len(), 1);

    session.prefetch_others().await;
    let listing = session.listing();
    let ids: Vec<_> = listing.iter().map(|entry| entry.id.as_str()).collect();
    assert_eq!(ids, vec![ACTIVE, THIRD, OTHER]);
    let flags: Vec<_> = listing
        .iter()
        .map(|entry| (entry.has_summary, entry.selected))
        .collect();
    assert_eq!(flags, vec![(true, true), (true, false), (false, false)]);
    assert_eq!(listing[1].file_name, format!("{THIRD}.jsonl"));

    // The cached active record wins over the stale stored copy.
    assert_eq!(
        session.get(&ConversationId::new(ACTIVE)).unwrap().summary(),
        "active summary"
    );
    assert_eq!(
        store.fetched_ids(),
        vec![ConversationId::new(OTHER), ConversationId::new(THIRD)]
    );
}

#[tokio::test]
async fn test_prefetch_runs_once() {
    let (_host, store, mut session) = open();
    session.prefetch_others().await;
    let fetched = store.fetched_ids().len();

    assert!(session.start_prefetch().is_none());
    session.prefetch_others().await;
    assert_eq!(store.fetched_ids().len(), fetched);
}

#[tokio::test]
async fn test_prefetch_keeps_edits() {
    let (_host, _store, mut session) = open();
    let other = ConversationId::new(OTHER);
    session.select(&other).await.unwrap();
    session.edit_summary(&other, "edited").unwrap();

    session.prefetch_others().await;
    assert_eq!(session.get(&other).unwrap().summary(), "edited");
    assert_eq!(session.records().len(), 3);
}

#[tokio::test]
async fn test_prefetch_skips_failures() {
    let (_host, store, mut session) = open();
    store.fail_gets_for(THIRD);
    session.prefetch_others().await;

    let ids: Vec<_> = session
        .listing()
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(
        ids,
        vec![ConversationId::new(ACTIVE), ConversationId::new(OTHER)]
    );
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_prefetch_list_failure() {
    let (_host, store, mut session) = open();
    store.fail_lists();
    session.prefetch_others().await;
    assert_eq!(session.records().len(), 1);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_stale_batch_is_discarded() {
    let (host, store) = testing::setup();
    store.set_delay(Duration::from_millis(5));
    let services = Services::new(host.clone(), store.clone());

    let mut first = ViewSession::open(services.clone()).unwrap();
    let prefetch = first.start_prefetch().unwrap();
    assert!(first.is_loading());
    drop(first);

    let mut second = ViewSession::open(services).unwrap();
    let batch = prefetch.run().await;
    assert_eq!(batch.len(), 2);
    assert!(!second.finish_prefetch(batch));
    assert_eq!(second.records().len(), 1);

    // Its own batch is still accepted.
    second.prefetch_others().await;
    assert_eq!(second.records().len(), 3);
}

#[tokio::test]
async fn test_group_conversations() {
    let owner = OwnerRef::Group {
        id: "g1".to_owned(),
    };
    let host = TestHost::new(owner.clone(), "Party").with_active_chat(
        "party",
        Metadata::new(),
        vec![],
    );
    let store = MemoryStore::default();
    store.insert(&owner, "party", &ChatFile::default());
    store.insert(
        &owner,
        "earlier",
        &ChatFile {
            metadata: testing::metadata_with("old times"),
            messages: vec![],
        },
    );
    let services = Services::new(Arc::new(host), store);
    let mut session = ViewSession::open(services).unwrap();
    session.prefetch_others().await;

    let record = session.get(&ConversationId::new("earlier")).unwrap();
    assert!(record.is_group());
    assert_eq!(record.summary(), "old times");
}

#[tokio::test]
async fn test_edit_template() {
    let (host, _store, mut session) = open();

    host.script_input(ScriptedInput::Cancel(CancelReason::ClickedOutside));
    assert!(!session.edit_template().await);
    assert!(host.injections().is_empty());

    let active = ConversationId::new(ACTIVE);
    session.edit_summary(&active, "unsaved").unwrap();
    host.script_input(ScriptedInput::Confirm("[{{总结}}]".to_owned()));
    assert!(session.edit_template().await);
    assert_eq!(host.settings().template, "[{{总结}}]");
    assert_eq!(host.injected_text().as_deref(), Some("[unsaved]"));
    assert_eq!(
        host.input_kinds(),
        vec![InputKind::Template, InputKind::Template]
    );
}
