//! The dirty-save pipeline.

use std::sync::Arc;

use chat_summary_model::{ChatFile, ConversationId, METADATA_KEY, Notice};
use tracing::Instrument;

use crate::{ConversationRecord, Error, ViewSession, composer};

/// The outcome of writing back the dirty conversations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Conversations that were written and are clean now.
    pub saved: Vec<ConversationId>,
    /// Conversations that failed to save and are still dirty.
    pub failed: Vec<(ConversationId, Error)>,
}

impl FlushReport {
    /// Returns `true` if nothing failed to save.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl ViewSession {
    /// Writes back every conversation with unsaved edits.
    ///
    /// The host's active conversation is written to its live metadata and
    /// its injection is refreshed. Any other conversation is saved through
    /// the chat store. A failure leaves that conversation dirty and
    /// doesn't stop the others from being saved.
    pub async fn flush_all(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        let pending = self.dirty_snapshot();
        if pending.is_empty() {
            return report;
        }

        let host = Arc::clone(self.services().host());
        info!("saving {} summaries", pending.len());
        host.notify(Notice::info("Saving summaries..."));

        let span = debug_span!("flush", token = self.token());
        async {
            for id in pending {
                let result = match self.get(&id) {
                    None => {
                        warn!("dirty conversation {id} is not cached");
                        continue;
                    }
                    Some(record) if self.is_active(&id) => {
                        self.write_live(record);
                        Ok(())
                    }
                    Some(record) => self.write_remote(record).await,
                };

                match result {
                    Ok(()) => {
                        debug!("saved {id}");
                        self.mark_saved(&id);
                        report.saved.push(id);
                    }
                    Err(err) => {
                        error!("failed to save {id}: {err}");
                        host.notify(Notice::error(format!(
                            "Failed to save the summary of \"{id}\": {}",
                            err.message()
                        )));
                        report.failed.push((id, err));
                    }
                }
            }
        }
        .instrument(span)
        .await;

        if !self.has_dirty() {
            host.notify(Notice::success("Summaries saved."));
        }
        report
    }

    /// Flushes every edit and closes the session.
    ///
    /// The session stays open if any conversation failed to save, so the
    /// edit isn't lost and closing can be retried.
    pub async fn close(&mut self) -> FlushReport {
        let report = self.flush_all().await;
        if self.has_dirty() {
            warn!(
                "{} summaries are unsaved, keeping the view open",
                report.failed.len()
            );
        } else {
            debug!("closed view session {}", self.token());
            self.mark_closed();
        }
        report
    }

    fn write_live(&self, record: &ConversationRecord) {
        let host = self.services().host().as_ref();
        host.update_metadata(METADATA_KEY, record.prompt_data().to_value());
        composer::apply_active(host);
    }

    async fn write_remote(
        &self,
        record: &ConversationRecord,
    ) -> Result<(), Error> {
        let file = ChatFile {
            metadata: record.metadata.clone(),
            messages: record.messages.clone(),
        };
        self.services()
            .store()
            .save_conversation(&record.owner, &record.id, &file)
            .await
    }
}
