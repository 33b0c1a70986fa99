//! Moves the visible history of a conversation into a new one.

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use chat_summary_model::{
    ChatFile, ConversationId, InputKind, InputOutcome, METADATA_KEY, Message,
    MigrationTag, Notice,
};
use chrono::{SecondsFormat, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::input::ask;
use crate::loader::LoaderGuard;
use crate::{Error, ViewSession, composer};

/// A step of the migration procedure, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MigrationStep {
    /// The source conversation was found in the cache.
    ResolveSource,
    /// The source messages were taken from the live or cached state.
    SelectMessages,
    /// Hidden system messages were dropped.
    FilterMessages,
    /// The source was tagged and saved.
    TagSource,
    /// The host created a new conversation.
    CreateDestination,
    /// The new conversation was renamed.
    RenameDestination,
    /// The new conversation was opened.
    OpenDestination,
    /// The history was written into the new conversation.
    SpliceHistory,
    /// The new conversation was tagged and its injection applied.
    TagDestination,
    /// The host saved the new conversation.
    SaveDestination,
    /// The editor was flushed and closed.
    CloseView,
    /// The host reloaded its view.
    ReloadView,
}

/// The outcome of a completed migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationReport {
    /// Id shared by the tags on both conversations.
    pub correlation_id: String,
    /// The conversation the history was copied from.
    pub source: ConversationId,
    /// The conversation the history was copied to.
    pub destination: ConversationId,
    /// Number of messages copied.
    pub migrated_messages: usize,
    /// Whether the greeting of the new conversation was dropped.
    pub seed_removed: bool,
}

/// A migration that stopped partway.
///
/// Completed steps are not rolled back. The error lists them, together
/// with the correlation id if the source was already tagged.
#[derive(Clone, Debug)]
pub struct MigrationError {
    error: Error,
    correlation_id: Option<String>,
    completed: Vec<MigrationStep>,
}

impl MigrationError {
    /// Returns the error that stopped the migration.
    #[inline]
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Returns the correlation id, if one was issued.
    #[inline]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the steps that completed before the failure.
    #[inline]
    pub fn completed(&self) -> &[MigrationStep] {
        &self.completed
    }
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration failed")?;
        if let Some(step) = self.completed.last() {
            write!(f, " after {step:?}")?;
        }
        write!(f, ": {}", self.error)
    }
}

impl StdError for MigrationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

impl From<Error> for MigrationError {
    fn from(error: Error) -> Self {
        Self {
            error,
            correlation_id: None,
            completed: vec![],
        }
    }
}

#[derive(Default)]
struct Saga {
    correlation_id: Option<String>,
    completed: Vec<MigrationStep>,
}

impl Saga {
    #[inline]
    fn commit(&mut self, step: MigrationStep) {
        trace!("{step:?} done");
        self.completed.push(step);
    }

    fn abort(self, error: Error) -> MigrationError {
        error!(
            correlation_id = ?self.correlation_id,
            completed = ?self.completed,
            "migration aborted: {error}"
        );
        MigrationError {
            error,
            correlation_id: self.correlation_id,
            completed: self.completed,
        }
    }
}

/// Drops every hidden system message, keeping the order of the rest.
pub fn filter_visible(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|message| !message.is_system_hidden())
        .cloned()
        .collect()
}

fn new_correlation_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &random[..9])
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ViewSession {
    /// Asks the user for a name and migrates the viewed conversation.
    ///
    /// Returns `Ok(None)` if the user cancelled the prompt.
    pub async fn request_migration(
        &mut self,
    ) -> Result<Option<MigrationReport>, MigrationError> {
        let host = Arc::clone(self.services().host());
        let default_name = host
            .active_chat()
            .map(|chat| format!("{} (cont.)", chat.owner_name))
            .unwrap_or_default();

        match ask(host.as_ref(), InputKind::ChatName, &default_name).await {
            InputOutcome::Confirmed(name) => self.migrate(&name).await.map(Some),
            InputOutcome::Cancelled(reason) => {
                info!("migration cancelled: {reason:?}");
                Ok(None)
            }
        }
    }

    /// Migrates the viewed conversation into a new one named `name`.
    ///
    /// The source keeps its full history and is tagged with a correlation
    /// id. The new conversation gets the visible messages, the source's
    /// summary and the matching tag. On success the session is closed and
    /// the host reloads its view.
    pub async fn migrate(
        &mut self,
        name: &str,
    ) -> Result<MigrationReport, MigrationError> {
        let host = Arc::clone(self.services().host());
        let name = name.trim();
        if name.is_empty() {
            host.notify(Notice::warning("The new conversation needs a name."));
            return Err(
                Error::validation_failure("the conversation name is empty")
                    .into(),
            );
        }

        info!("migrating {} to {name}", self.viewing());
        host.notify(Notice::info("Migrating the conversation..."));
        let _loader = LoaderGuard::show(Arc::clone(&host));

        let mut saga = Saga::default();
        let span = info_span!("migration", to = name);
        let result = self.run_migration(name, &mut saga).instrument(span).await;
        match result {
            Ok(report) => {
                host.notify(Notice::success(format!(
                    "Migrated {} messages to \"{}\".",
                    report.migrated_messages, report.destination
                )));
                Ok(report)
            }
            Err(err) => {
                host.notify(Notice::error(format!(
                    "Migration failed: {}",
                    err.message()
                )));
                Err(saga.abort(err))
            }
        }
    }

    async fn run_migration(
        &mut self,
        name: &str,
        saga: &mut Saga,
    ) -> Result<MigrationReport, Error> {
        use MigrationStep::*;

        let host = Arc::clone(self.services().host());

        let Some(source) = self.get(self.viewing()).cloned() else {
            return Err(Error::not_found("the source conversation is gone"));
        };
        saga.commit(ResolveSource);

        let live = self.is_active(&source.id);
        let messages = if live {
            host.live_messages()
        } else {
            source.messages.clone()
        };
        saga.commit(SelectMessages);

        let history = filter_visible(&messages);
        debug!(
            "{} of {} messages are visible",
            history.len(),
            messages.len()
        );
        host.notify(Notice::info(format!(
            "Migrating {} visible messages.",
            history.len()
        )));
        saga.commit(FilterMessages);

        let correlation_id = new_correlation_id();
        saga.correlation_id = Some(correlation_id.clone());
        let destination = ConversationId::new(name);
        let summary = source.prompt_data();

        let mut source_data = summary.clone();
        source_data.migration = Some(MigrationTag::Source {
            migrated_to: destination.to_string(),
            id: correlation_id.clone(),
            timestamp: now_timestamp(),
        });
        let mut tagged = source.metadata.clone();
        source_data.write_to(&mut tagged);
        let file = ChatFile {
            metadata: tagged.clone(),
            messages,
        };
        self.services()
            .store()
            .save_conversation(&source.owner, &source.id, &file)
            .await?;
        if live {
            host.update_metadata(METADATA_KEY, source_data.to_value());
        }
        if let Some(record) = self.get_mut(&source.id) {
            record.metadata = tagged;
        }
        saga.commit(TagSource);

        let temporary = host.new_chat().await?;
        saga.commit(CreateDestination);
        host.rename_chat(&temporary, &destination).await?;
        saga.commit(RenameDestination);
        host.open_chat(&destination).await?;
        saga.commit(OpenDestination);

        let mut live_messages = host.live_messages();
        let seed_removed = !live_messages.is_empty();
        if seed_removed {
            live_messages.remove(0);
        }
        let migrated_messages = history.len();
        live_messages.extend(history);
        host.set_live_messages(live_messages);
        saga.commit(SpliceHistory);

        let mut destination_data = summary;
        destination_data.migration = Some(MigrationTag::Destination {
            migrated_from: source.id.to_string(),
            id: correlation_id.clone(),
            timestamp: now_timestamp(),
        });
        host.update_metadata(METADATA_KEY, destination_data.to_value());
        composer::apply_active(host.as_ref());
        saga.commit(TagDestination);

        host.save_chat().await?;
        saga.commit(SaveDestination);

        let flush = self.close().await;
        if !flush.is_success() {
            warn!("{} summaries are still unsaved", flush.failed.len());
        }
        saga.commit(CloseView);

        host.reload_chat().await?;
        saga.commit(ReloadView);

        Ok(MigrationReport {
            correlation_id,
            source: source.id,
            destination,
            migrated_messages,
            seed_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use chat_summary_model::{
        CancelReason, ConversationId, Host, InputKind, MigrationTag,
        NoticeLevel, PromptData,
    };
    use chat_summary_test_host::{HostOp, ScriptedInput};
    use serde_json::json;

    use super::*;
    use crate::testing::{self, ACTIVE, OTHER};
    use crate::{ErrorKind, Services};

    fn history() -> Vec<Message> {
        vec![
            testing::message("m0"),
            testing::message("m1"),
            testing::hidden("m2"),
            testing::message("m3"),
            testing::message("m4"),
        ]
    }

    #[test]
    fn test_filter_visible() {
        let messages = vec![
            testing::message("a"),
            testing::hidden("b"),
            Message::from(json!({ "mes": "c", "is_system": "true" })),
            Message::from(json!({ "mes": "d", "is_system": false })),
        ];
        let visible: Vec<_> = filter_visible(&messages)
            .into_iter()
            .map(|message| message.as_value()["mes"].clone())
            .collect();
        assert_eq!(visible, vec![json!("a"), json!("c"), json!("d")]);
    }

    #[test]
    fn test_correlation_id_format() {
        let id = new_correlation_id();
        let (millis, random) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 9);
        assert!(now_timestamp().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_migrate_active_conversation() {
        let host = chat_summary_test_host::TestHost::new(testing::owner(), "Alice")
            .with_active_chat(ACTIVE, testing::metadata_with("S1"), history())
            .with_greeting(testing::message("greeting"));
        let host = Arc::new(host);
        let (_, store) = testing::setup();
        let services = Services::new(host.clone(), store.clone());
        let mut session = ViewSession::open(services).unwrap();

        let report = session.migrate("  Alice - part 2  ").await.unwrap();
        assert_eq!(report.source, ConversationId::new(ACTIVE));
        assert_eq!(report.destination, ConversationId::new("Alice - part 2"));
        assert_eq!(report.migrated_messages, 4);
        assert!(report.seed_removed);
        assert!(session.is_closed());

        // The destination has the visible history and the summary.
        let saved = host.saved();
        let destination = saved.last().unwrap();
        assert_eq!(destination.id, report.destination);
        let texts: Vec<_> = destination
            .messages
            .iter()
            .map(|message| message.as_value()["mes"].clone())
            .collect();
        assert_eq!(
            texts,
            vec![json!("m0"), json!("m1"), json!("m3"), json!("m4")]
        );
        let data = PromptData::from_metadata(&destination.metadata);
        assert_eq!(data.text(), "S1");
        let Some(MigrationTag::Destination {
            migrated_from, id, ..
        }) = data.migration
        else {
            panic!("destination is not tagged");
        };
        assert_eq!(migrated_from, ACTIVE);
        assert_eq!(id, report.correlation_id);

        // The source keeps its full history and the matching tag.
        let source = store.file(&testing::owner(), ACTIVE).unwrap();
        assert_eq!(source.messages.len(), 5);
        let data = PromptData::from_metadata(&source.metadata);
        assert_eq!(data.text(), "S1");
        let Some(MigrationTag::Source { migrated_to, id, .. }) = data.migration
        else {
            panic!("source is not tagged");
        };
        assert_eq!(migrated_to, "Alice - part 2");
        assert_eq!(id, report.correlation_id);
        assert_eq!(source.metadata["note_prompt"], json!("keep me"));

        assert_eq!(host.loader_depth(), 0);
        assert_eq!(host.loader_shows(), 1);
        assert_eq!(host.reloads(), 1);
        assert_eq!(host.injected_text().as_deref(), Some("S1"));
        assert_eq!(host.notices_with(NoticeLevel::Success).len(), 1);
    }

    #[tokio::test]
    async fn test_migrate_cached_conversation() {
        let (host, store) = testing::setup();
        let services = Services::new(host.clone(), store.clone());
        let mut session = ViewSession::open(services).unwrap();
        let other = ConversationId::new(OTHER);
        session.select(&other).await.unwrap();
        session.edit_summary(&other, "unsaved").unwrap();

        let report = session.migrate("Alice - next").await.unwrap();
        assert_eq!(report.source, other);
        assert_eq!(report.migrated_messages, 1);
        assert!(!report.seed_removed);

        // The flush on close keeps the tag written before it.
        let source = store.file(&testing::owner(), OTHER).unwrap();
        let data = PromptData::from_metadata(&source.metadata);
        assert_eq!(data.text(), "unsaved");
        assert!(matches!(data.migration, Some(MigrationTag::Source { .. })));

        // The destination carries the edited summary.
        assert_eq!(
            host.saved().last().unwrap().id,
            ConversationId::new("Alice - next")
        );
        assert_eq!(
            testing::summary_of(&host.live_metadata()),
            "unsaved"
        );
    }

    #[tokio::test]
    async fn test_failure_reports_completed_steps() {
        let (host, store) = testing::setup();
        host.fail(HostOp::NewChat);
        let services = Services::new(host.clone(), store.clone());
        let mut session = ViewSession::open(services).unwrap();

        let err = session.migrate("Alice - next").await.unwrap_err();
        assert_eq!(err.error().kind(), ErrorKind::Host);
        assert_eq!(
            err.completed(),
            &[
                MigrationStep::ResolveSource,
                MigrationStep::SelectMessages,
                MigrationStep::FilterMessages,
                MigrationStep::TagSource,
            ]
        );
        assert!(err.correlation_id().is_some());
        assert!(!session.is_closed());
        assert_eq!(host.loader_depth(), 0);
        assert_eq!(host.notices_with(NoticeLevel::Error).len(), 1);

        // The source stays tagged; nothing is rolled back.
        let source = store.file(&testing::owner(), ACTIVE).unwrap();
        let data = PromptData::from_metadata(&source.metadata);
        assert_eq!(
            data.migration.as_ref().map(MigrationTag::correlation_id),
            err.correlation_id()
        );
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let (host, store) = testing::setup();
        let services = Services::new(host.clone(), store.clone());
        let mut session = ViewSession::open(services).unwrap();

        let err = session.migrate("   ").await.unwrap_err();
        assert_eq!(err.error().kind(), ErrorKind::ValidationFailure);
        assert!(err.completed().is_empty());
        assert_eq!(host.loader_shows(), 0);
        assert!(store.saved_ids().is_empty());
    }

    #[tokio::test]
    async fn test_request_migration() {
        let (host, store) = testing::setup();
        let services = Services::new(host.clone(), store.clone());
        let mut session = ViewSession::open(services).unwrap();

        host.script_input(ScriptedInput::Cancel(CancelReason::Escape));
        assert_eq!(session.request_migration().await.unwrap(), None);
        assert!(store.saved_ids().is_empty());

        host.script_input(ScriptedInput::Confirm("  ".to_owned()));
        host.script_input(ScriptedInput::Confirm("Alice (cont.)".to_owned()));
        let report = session.request_migration().await.unwrap().unwrap();
        assert_eq!(report.destination, ConversationId::new("Alice (cont.)"));
        assert_eq!(
            host.input_kinds(),
            vec![InputKind::ChatName, InputKind::ChatName]
        );
        assert_eq!(host.notices_with(NoticeLevel::Warning).len(), 1);
    }
}
