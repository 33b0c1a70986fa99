mod prefetch;
mod record;
#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chat_summary_model::{
    ChatStore, ConversationId, Host, InputKind, InputOutcome, OwnerRef,
};

use crate::input::ask;
use crate::{Error, StoreClient, composer};
pub use prefetch::{Prefetch, PrefetchBatch};
pub use record::{ConversationRecord, ListingEntry};

static NEXT_SESSION_TOKEN: AtomicU64 = AtomicU64::new(1);

/// The collaborators every view session works with.
#[derive(Clone)]
pub struct Services {
    pub(crate) host: Arc<dyn Host>,
    pub(crate) store: StoreClient,
}

impl Services {
    /// Creates the services from a host and a chat store.
    #[inline]
    pub fn new<S: ChatStore + 'static>(host: Arc<dyn Host>, store: S) -> Self {
        Self::with_store_client(host, StoreClient::new(store))
    }

    /// Creates the services from a host and an already wrapped store.
    #[inline]
    pub fn with_store_client(host: Arc<dyn Host>, store: StoreClient) -> Self {
        Self { host, store }
    }

    /// Returns the host.
    #[inline]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Returns the chat store.
    #[inline]
    pub fn store(&self) -> &StoreClient {
        &self.store
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PrefetchStage {
    Idle,
    Running,
    Done,
}

/// The state of one opening of the summary editor.
///
/// A session owns the cache of conversation records for the active
/// owner and the set of conversations with unsaved edits. It is created
/// when the editor opens and dropped once it has been closed. Nothing
/// outside the session writes to its cache or dirty set.
///
/// Every conversation in the dirty set has a record in the cache, since
/// records are never evicted during a session and only cached records
/// can be edited.
pub struct ViewSession {
    services: Services,
    token: u64,
    owner: OwnerRef,
    records: Vec<ConversationRecord>,
    dirty: BTreeSet<ConversationId>,
    viewing: ConversationId,
    prefetch: PrefetchStage,
    closed: bool,
}

impl ViewSession {
    /// Opens a session for the host's active conversation.
    ///
    /// The active conversation is seeded from the host's live state, so
    /// edits the host has not saved yet are visible.
    pub fn open(services: Services) -> Result<Self, Error> {
        let Some(active) = services.host.active_chat() else {
            return Err(Error::not_found("no conversation is open"));
        };
        let record =
            ConversationRecord::from_live(&active, services.host.as_ref());
        let token = NEXT_SESSION_TOKEN.fetch_add(1, Ordering::Relaxed);
        debug!("opened view session {token} on {}", active.id);

        Ok(Self {
            services,
            token,
            owner: active.owner,
            records: vec![record],
            dirty: Default::default(),
            viewing: active.id,
            prefetch: PrefetchStage::Idle,
            closed: false,
        })
    }

    /// Returns the token identifying this session.
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Returns the owner whose conversations are listed.
    #[inline]
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// Returns the conversation currently shown in the editor.
    #[inline]
    pub fn viewing(&self) -> &ConversationId {
        &self.viewing
    }

    /// Returns the cached record of a conversation.
    #[inline]
    pub fn get(&self, id: &ConversationId) -> Option<&ConversationRecord> {
        self.records.iter().find(|record| record.id == *id)
    }

    #[inline]
    pub(crate) fn get_mut(
        &mut self,
        id: &ConversationId,
    ) -> Option<&mut ConversationRecord> {
        self.records.iter_mut().find(|record| record.id == *id)
    }

    /// Returns every cached record, in listing order.
    #[inline]
    pub fn records(&self) -> &[ConversationRecord] {
        &self.records
    }

    /// Returns `true` if the conversation has unsaved edits.
    #[inline]
    pub fn is_dirty(&self, id: &ConversationId) -> bool {
        self.dirty.contains(id)
    }

    /// Returns the conversations with unsaved edits.
    #[inline]
    pub fn dirty_ids(&self) -> impl Iterator<Item = &ConversationId> {
        self.dirty.iter()
    }

    /// Returns `true` while other conversations are loading in the
    /// background.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.prefetch == PrefetchStage::Running
    }

    /// Returns `true` once the session has been closed with every edit
    /// saved.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn is_active(&self, id: &ConversationId) -> bool {
        self.services
            .host
            .active_chat()
            .is_some_and(|active| active.id == *id)
    }

    /// Makes sure a conversation is cached.
    ///
    /// The host's active conversation is built from live state, and any
    /// other conversation is fetched from the chat store.
    pub async fn ensure_loaded(
        &mut self,
        id: &ConversationId,
    ) -> Result<(), Error> {
        if self.get(id).is_some() {
            return Ok(());
        }

        let host = Arc::clone(&self.services.host);
        let record = match host.active_chat() {
            Some(active) if active.id == *id => {
                trace!("seeding {id} from live state");
                ConversationRecord::from_live(&active, host.as_ref())
            }
            _ => {
                let file = self
                    .services
                    .store
                    .get_conversation(&self.owner, id)
                    .await?;
                ConversationRecord::from_file(
                    id.clone(),
                    id.file_name(),
                    self.owner.clone(),
                    file,
                )
            }
        };
        self.records.push(record);
        Ok(())
    }

    /// Loads a conversation if needed and shows it in the editor.
    pub async fn select(&mut self, id: &ConversationId) -> Result<(), Error> {
        self.ensure_loaded(id).await?;
        self.viewing = id.clone();
        Ok(())
    }

    /// Replaces the summary of a cached conversation.
    ///
    /// The conversation is marked dirty right away. If it is the active
    /// conversation, the injection is updated immediately.
    pub fn edit_summary(
        &mut self,
        id: &ConversationId,
        text: &str,
    ) -> Result<(), Error> {
        let is_active = self.is_active(id);
        let Some(record) = self.get_mut(id) else {
            return Err(Error::not_found(format!("{id} is not loaded")));
        };
        record.set_summary(text.to_owned());
        self.dirty.insert(id.clone());
        trace!("{id} is dirty");

        if is_active {
            composer::apply_summary(self.services.host.as_ref(), text);
        }
        Ok(())
    }

    /// Appends a paragraph to the summary of a cached conversation.
    ///
    /// Returns `false` and changes nothing if the addition is blank.
    pub fn append_summary(
        &mut self,
        id: &ConversationId,
        addition: &str,
    ) -> Result<bool, Error> {
        let addition = addition.trim();
        if addition.is_empty() {
            return Ok(false);
        }
        let Some(record) = self.get(id) else {
            return Err(Error::not_found(format!("{id} is not loaded")));
        };
        let data = record.prompt_data();
        let current = data.text().trim();
        let text = if current.is_empty() {
            addition.to_owned()
        } else {
            format!("{current}\n\n{addition}")
        };
        self.edit_summary(id, &text)?;
        Ok(true)
    }

    /// Lets the user edit the global template.
    ///
    /// Returns `false` if the user cancelled the editor.
    pub async fn edit_template(&mut self) -> bool {
        let host = Arc::clone(&self.services.host);
        let mut settings = host.settings();
        let template =
            match ask(host.as_ref(), InputKind::Template, &settings.template)
                .await
            {
                InputOutcome::Confirmed(template) => template,
                InputOutcome::Cancelled(_) => return false,
            };
        settings.template = template;
        host.save_settings(settings);
        self.reapply_active();
        true
    }

    /// Returns the entries of the conversation list, in listing order.
    pub fn listing(&self) -> Vec<ListingEntry> {
        self.records
            .iter()
            .map(|record| ListingEntry {
                id: record.id.clone(),
                display_name: record.display_name.clone(),
                file_name: record.file_name.clone(),
                has_summary: record.has_summary(),
                selected: record.id == self.viewing,
            })
            .collect()
    }

    /// Starts loading every other conversation of the owner.
    ///
    /// Returns `None` if a load is in flight or has already completed in
    /// this session. The returned [`Prefetch`] doesn't borrow the session
    /// and may run on another task; hand its batch to
    /// [`finish_prefetch`](Self::finish_prefetch).
    pub fn start_prefetch(&mut self) -> Option<Prefetch> {
        if self.prefetch != PrefetchStage::Idle {
            trace!("prefetch is {:?}, not starting again", self.prefetch);
            return None;
        }
        self.prefetch = PrefetchStage::Running;

        let known: HashSet<ConversationId> =
            self.records.iter().map(|record| record.id.clone()).collect();
        Some(Prefetch::new(
            self.token,
            self.owner.clone(),
            known,
            self.services.store.clone(),
        ))
    }

    /// Merges a prefetched batch and reorders the listing.
    ///
    /// Records already cached are kept as they are. A batch started by
    /// another session is discarded, and `false` is returned.
    pub fn finish_prefetch(&mut self, batch: PrefetchBatch) -> bool {
        if batch.token != self.token {
            debug!(
                "discarded a stale batch from session {} in session {}",
                batch.token, self.token
            );
            return false;
        }

        for record in batch.records {
            if self.get(&record.id).is_none() {
                self.records.push(record);
            }
        }
        self.reorder();
        self.prefetch = PrefetchStage::Done;
        true
    }

    /// Loads every other conversation of the owner in place.
    pub async fn prefetch_others(&mut self) {
        let Some(prefetch) = self.start_prefetch() else {
            return;
        };
        let batch = prefetch.run().await;
        self.finish_prefetch(batch);
    }

    /// Orders the listing: the active conversation first, then those with
    /// a summary, each group by id.
    fn reorder(&mut self) {
        let active = self.services.host.active_chat().map(|chat| chat.id);
        self.records.sort_by_cached_key(|record| {
            (
                Some(&record.id) != active.as_ref(),
                !record.has_summary(),
                record.id.clone(),
            )
        });
    }

    /// Re-applies the injection of the active conversation, preferring the
    /// cached summary, which may hold edits not flushed yet.
    pub(crate) fn reapply_active(&self) {
        let host = self.services.host.as_ref();
        let active = host.active_chat().map(|chat| chat.id);
        match active.and_then(|id| self.get(&id)) {
            Some(record) => {
                composer::apply_summary(host, record.prompt_data().text())
            }
            None => composer::apply_active(host),
        }
    }

    #[inline]
    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    #[inline]
    pub(crate) fn dirty_snapshot(&self) -> Vec<ConversationId> {
        self.dirty.iter().cloned().collect()
    }

    #[inline]
    pub(crate) fn mark_saved(&mut self, id: &ConversationId) {
        self.dirty.remove(id);
    }

    #[inline]
    pub(crate) fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    #[inline]
    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }
}
