//! In-memory collaborators for testing purpose.
//!
//! [`MemoryStore`] is a chat store that keeps conversation files in memory
//! and can be told to fail for specific conversations. [`TestHost`] is a
//! scripted host that records every injection, notice and loader change.
//!
//! # Note
//!
//! These types are not optimized for production use, there are heavy
//! memory copies involved. You should only use them for testing.

mod host;

use std::collections::{BTreeMap, HashSet};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chat_summary_model::{
    ChatFile, ChatStore, ChatStoreError, ConversationEntry, ConversationId,
    OwnerRef, StoreErrorKind,
};
use serde_json::Value;
use tokio::time::sleep;

pub use host::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: StoreErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ChatStoreError for Error {
    #[inline]
    fn kind(&self) -> StoreErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    files: BTreeMap<(OwnerRef, ConversationId), Vec<Value>>,
    failing_saves: HashSet<ConversationId>,
    failing_gets: HashSet<ConversationId>,
    failing_lists: bool,
    saves: Vec<ConversationId>,
    gets: Vec<ConversationId>,
    delay: Option<Duration>,
}

/// A chat store that keeps conversation files in memory.
///
/// Files are kept in their encoded record form, so everything that goes
/// through the store also goes through the wire envelope codec. Clones
/// share the same files.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().expect("memory store is poisoned")
    }

    /// Stores a conversation file.
    pub fn insert(&self, owner: &OwnerRef, id: &str, file: &ChatFile) {
        self.insert_records(owner, id, file.to_records());
    }

    /// Stores raw records as a conversation file.
    pub fn insert_records(&self, owner: &OwnerRef, id: &str, records: Vec<Value>) {
        self.lock()
            .files
            .insert((owner.clone(), ConversationId::new(id)), records);
    }

    /// Returns the decoded conversation file, if stored.
    pub fn file(&self, owner: &OwnerRef, id: &str) -> Option<ChatFile> {
        self.records(owner, id).map(ChatFile::from_records)
    }

    /// Returns the raw records of a conversation file, if stored.
    pub fn records(&self, owner: &OwnerRef, id: &str) -> Option<Vec<Value>> {
        self.lock()
            .files
            .get(&(owner.clone(), ConversationId::new(id)))
            .cloned()
    }

    /// Makes every save of the conversation fail.
    #[inline]
    pub fn fail_saves_for(&self, id: &str) {
        self.lock().failing_saves.insert(ConversationId::new(id));
    }

    /// Makes every fetch of the conversation fail.
    #[inline]
    pub fn fail_gets_for(&self, id: &str) {
        self.lock().failing_gets.insert(ConversationId::new(id));
    }

    /// Makes every listing fail.
    #[inline]
    pub fn fail_lists(&self) {
        self.lock().failing_lists = true;
    }

    /// Stops every injected failure.
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.failing_saves.clear();
        inner.failing_gets.clear();
        inner.failing_lists = false;
    }

    /// Delays every response by the given duration.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        self.lock().delay = Some(duration);
    }

    /// Returns the conversations saved so far, in order.
    #[inline]
    pub fn saved_ids(&self) -> Vec<ConversationId> {
        self.lock().saves.clone()
    }

    /// Returns the conversations fetched so far, in order.
    #[inline]
    pub fn fetched_ids(&self) -> Vec<ConversationId> {
        self.lock().gets.clone()
    }

    #[inline]
    fn delay(&self) -> Option<Duration> {
        self.lock().delay
    }
}

fn respond<T: Send + 'static>(
    delay: Option<Duration>,
    result: Result<T, Error>,
) -> impl Future<Output = Result<T, Error>> + Send + 'static {
    async move {
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        result
    }
}

impl ChatStore for MemoryStore {
    type Error = crate::Error;

    fn list_conversations(
        &self,
        owner: &OwnerRef,
    ) -> impl Future<Output = Result<Vec<ConversationEntry>, Self::Error>>
    + Send
    + 'static {
        let result = {
            let inner = self.lock();
            if inner.failing_lists {
                Err(Error {
                    message: "listing failed".to_owned(),
                    kind: StoreErrorKind::NetworkFailure,
                })
            } else {
                Ok(inner
                    .files
                    .keys()
                    .filter(|(file_owner, _)| file_owner == owner)
                    .map(|(_, id)| ConversationEntry {
                        id: id.clone(),
                        file_name: id.file_name(),
                    })
                    .collect())
            }
        };
        respond(self.delay(), result)
    }

    fn get_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
    ) -> impl Future<Output = Result<ChatFile, Self::Error>> + Send + 'static
    {
        let result = {
            let mut inner = self.lock();
            inner.gets.push(id.clone());
            if inner.failing_gets.contains(id) {
                Err(Error {
                    message: format!("fetching {id} failed"),
                    kind: StoreErrorKind::NetworkFailure,
                })
            } else {
                inner
                    .files
                    .get(&(owner.clone(), id.clone()))
                    .cloned()
                    .map(ChatFile::from_records)
                    .ok_or_else(|| Error {
                        message: format!("{id} not found"),
                        kind: StoreErrorKind::NotFound,
                    })
            }
        };
        respond(self.delay(), result)
    }

    fn save_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
        file: &ChatFile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = {
            let mut inner = self.lock();
            if inner.failing_saves.contains(id) {
                Err(Error {
                    message: format!("saving {id} failed"),
                    kind: StoreErrorKind::NetworkFailure,
                })
            } else {
                inner.saves.push(id.clone());
                inner
                    .files
                    .insert((owner.clone(), id.clone()), file.to_records());
                Ok(())
            }
        };
        respond(self.delay(), result)
    }
}
