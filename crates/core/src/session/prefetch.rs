use std::collections::HashSet;

use chat_summary_model::{ConversationId, OwnerRef};
use tracing::Instrument;

use super::ConversationRecord;
use crate::StoreClient;

/// A pending load of the owner's other conversations.
///
/// Created by [`ViewSession::start_prefetch`](super::ViewSession::start_prefetch).
pub struct Prefetch {
    token: u64,
    owner: OwnerRef,
    known: HashSet<ConversationId>,
    store: StoreClient,
}

impl Prefetch {
    pub(crate) fn new(
        token: u64,
        owner: OwnerRef,
        known: HashSet<ConversationId>,
        store: StoreClient,
    ) -> Self {
        Self {
            token,
            owner,
            known,
            store,
        }
    }

    /// Returns the token of the session that started the load.
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Fetches every conversation of the owner that isn't cached yet.
    ///
    /// Failures never abort the load. A listing failure yields an empty
    /// batch and a conversation that can't be fetched is skipped.
    pub async fn run(self) -> PrefetchBatch {
        let Self {
            token,
            owner,
            known,
            store,
        } = self;
        let span = debug_span!("prefetch", token);

        async move {
            let entries = match store.list_conversations(&owner).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("failed to list conversations: {err}");
                    return PrefetchBatch {
                        token,
                        records: vec![],
                    };
                }
            };

            let mut records = Vec::with_capacity(entries.len());
            for entry in entries {
                if known.contains(&entry.id) {
                    continue;
                }
                match store.get_conversation(&owner, &entry.id).await {
                    Ok(file) => records.push(ConversationRecord::from_file(
                        entry.id,
                        entry.file_name,
                        owner.clone(),
                        file,
                    )),
                    Err(err) => warn!("skipped {}: {err}", entry.id),
                }
            }
            debug!("loaded {} conversations", records.len());
            PrefetchBatch { token, records }
        }
        .instrument(span)
        .await
    }
}

/// The records loaded by a [`Prefetch`].
#[derive(Debug)]
pub struct PrefetchBatch {
    pub(crate) token: u64,
    pub(crate) records: Vec<ConversationRecord>,
}

impl PrefetchBatch {
    /// Returns the token of the session that started the load.
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Returns the number of loaded conversations.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was loaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
