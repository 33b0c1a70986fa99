//! Per-conversation summaries injected into the prompt of a chat host.
//!
//! The [`Editor`] drives the summary editor of one host: it applies the
//! injection whenever the active conversation changes, opens and closes
//! view sessions, and loads the owner's other conversations in the
//! background while a view is open.
//!
//! The crate also ships a CLI that runs against a chat server through
//! the [`headless`] host.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod headless;

use chat_summary_core::{
    Error, FlushReport, MigrationError, MigrationReport, PrefetchBatch,
    Services, ViewSession, composer,
};
use tokio::task::JoinHandle;

/// Re-exports of [`chat_summary_core`] crate.
pub mod core {
    pub use chat_summary_core::*;
}

/// Re-exports of [`chat_summary_model`] crate.
pub mod model {
    pub use chat_summary_model::*;
}

/// The summary editor of one host.
///
/// At most one view session is open at a time. Opening a view starts a
/// background task loading the owner's other conversations; its result
/// is merged by [`finish_prefetch`](Self::finish_prefetch).
pub struct Editor {
    services: Services,
    view: Option<ViewSession>,
    prefetch: Option<JoinHandle<PrefetchBatch>>,
}

impl Editor {
    /// Creates an editor without an open view.
    #[inline]
    pub fn new(services: Services) -> Self {
        Self {
            services,
            view: None,
            prefetch: None,
        }
    }

    /// Returns the services the editor works with.
    #[inline]
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Applies the injection of the active conversation on startup.
    #[inline]
    pub fn start(&self) {
        composer::apply_active(self.services.host().as_ref());
    }

    /// Re-applies the injection after the host switched conversations.
    #[inline]
    pub fn on_chat_changed(&self) {
        debug!("active conversation changed");
        composer::apply_active(self.services.host().as_ref());
    }

    /// Opens a fresh view on the active conversation.
    ///
    /// Any view left open before is dropped together with its pending
    /// load. Must be called within a Tokio runtime.
    pub fn open_view(&mut self) -> Result<&mut ViewSession, Error> {
        if let Some(prefetch) = self.prefetch.take() {
            prefetch.abort();
        }
        if self.view.take().is_some() {
            warn!("dropping a view that was never closed");
        }

        let mut view = ViewSession::open(self.services.clone())?;
        if let Some(prefetch) = view.start_prefetch() {
            self.prefetch = Some(tokio::spawn(prefetch.run()));
        }
        Ok(self.view.insert(view))
    }

    /// Waits for the background load and merges it into the open view.
    ///
    /// Returns `false` if nothing was merged.
    pub async fn finish_prefetch(&mut self) -> bool {
        let Some(prefetch) = self.prefetch.take() else {
            return false;
        };
        let batch = match prefetch.await {
            Ok(batch) => batch,
            Err(err) => {
                warn!("background load did not finish: {err}");
                return false;
            }
        };
        match &mut self.view {
            Some(view) => view.finish_prefetch(batch),
            None => false,
        }
    }

    /// Returns the open view.
    #[inline]
    pub fn view(&self) -> Option<&ViewSession> {
        self.view.as_ref()
    }

    /// Returns the open view.
    #[inline]
    pub fn view_mut(&mut self) -> Option<&mut ViewSession> {
        self.view.as_mut()
    }

    /// Flushes and closes the open view.
    ///
    /// The view stays open if any summary failed to save. Returns `None`
    /// if no view is open.
    pub async fn close_view(&mut self) -> Option<FlushReport> {
        let view = self.view.as_mut()?;
        let report = view.close().await;
        if view.is_closed() {
            self.drop_view();
        }
        Some(report)
    }

    /// Asks for a name and migrates the viewed conversation.
    ///
    /// A completed migration closes the view.
    pub async fn migrate(
        &mut self,
    ) -> Result<Option<MigrationReport>, MigrationError> {
        let Some(view) = self.view.as_mut() else {
            return Err(Error::not_found("the editor is not open").into());
        };
        let result = view.request_migration().await;
        if view.is_closed() {
            self.drop_view();
        }
        result
    }

    fn drop_view(&mut self) {
        self.view = None;
        if let Some(prefetch) = self.prefetch.take() {
            prefetch.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chat_summary_model::{
        ChatFile, ConversationId, Host, METADATA_KEY, Metadata, OwnerRef,
    };
    use chat_summary_test_host::{MemoryStore, TestHost};
    use serde_json::json;

    use super::*;

    fn owner() -> OwnerRef {
        OwnerRef::Group {
            id: "g1".to_owned(),
        }
    }

    fn editor() -> (Arc<TestHost>, MemoryStore, Editor) {
        let host = Arc::new(TestHost::new(owner(), "Party").with_active_chat(
            "today",
            Metadata::new(),
            vec![],
        ));
        let store = MemoryStore::default();
        store.insert(&owner(), "today", &ChatFile::default());
        store.insert(&owner(), "yesterday", &ChatFile::default());
        let editor = Editor::new(Services::new(host.clone(), store.clone()));
        (host, store, editor)
    }

    #[tokio::test]
    async fn test_view_lifecycle() {
        let (host, store, mut editor) = editor();
        editor.start();
        assert_eq!(host.injected_text().as_deref(), Some(""));

        editor.open_view().unwrap();
        assert!(editor.view().unwrap().is_loading());
        assert!(editor.finish_prefetch().await);
        assert!(!editor.finish_prefetch().await);

        let yesterday = ConversationId::new("yesterday");
        let view = editor.view_mut().unwrap();
        assert_eq!(view.records().len(), 2);
        view.edit_summary(&yesterday, "the day before").unwrap();

        let report = editor.close_view().await.unwrap();
        assert_eq!(report.saved, vec![yesterday]);
        assert!(editor.view().is_none());
        assert!(editor.close_view().await.is_none());
        let file = store.file(&owner(), "yesterday").unwrap();
        assert!(!file.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_failed_close_keeps_view() {
        let (_host, store, mut editor) = editor();
        store.fail_saves_for("yesterday");
        editor.open_view().unwrap();
        editor.finish_prefetch().await;

        let yesterday = ConversationId::new("yesterday");
        let view = editor.view_mut().unwrap();
        view.edit_summary(&yesterday, "kept").unwrap();

        let report = editor.close_view().await.unwrap();
        assert!(!report.is_success());
        let view = editor.view().unwrap();
        assert!(view.is_dirty(&yesterday));
    }

    #[tokio::test]
    async fn test_reopen_discards_pending_load() {
        let (_host, _store, mut editor) = editor();
        let first = editor.open_view().unwrap().token();
        let second = editor.open_view().unwrap().token();
        assert_ne!(first, second);

        assert!(editor.finish_prefetch().await);
        assert_eq!(editor.view().unwrap().records().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_switch_reapplies_injection() {
        let (host, _store, editor) = editor();
        editor.start();
        assert_eq!(host.injected_text().as_deref(), Some(""));

        host.new_chat().await.unwrap();
        host.update_metadata(METADATA_KEY, json!({ "prompt": "fresh" }));
        editor.on_chat_changed();
        assert_eq!(host.injected_text().as_deref(), Some("fresh"));

        host.open_chat(&ConversationId::new("today")).await.unwrap();
        editor.on_chat_changed();
        assert_eq!(host.injected_text().as_deref(), Some(""));
        assert_eq!(host.injections().len(), 3);
    }

    #[tokio::test]
    async fn test_migrate_without_view() {
        let (_host, _store, mut editor) = editor();
        let err = editor.migrate().await.unwrap_err();
        assert_eq!(err.error().kind(), chat_summary_core::ErrorKind::NotFound);
    }
}
