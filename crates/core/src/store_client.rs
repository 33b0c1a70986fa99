use std::pin::Pin;
use std::sync::Arc;

use chat_summary_model::{
    ChatFile, ChatStore, ConversationEntry, ConversationId, OwnerRef,
};
use tracing::Instrument;

use crate::Error;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;

trait StoreObject: Send + Sync + 'static {
    fn list_conversations(
        &self,
        owner: &OwnerRef,
    ) -> BoxedFuture<Vec<ConversationEntry>>;

    fn get_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
    ) -> BoxedFuture<ChatFile>;

    fn save_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
        file: &ChatFile,
    ) -> BoxedFuture<()>;
}

struct AnyStore<S: ChatStore>(S);

impl<S: ChatStore + 'static> StoreObject for AnyStore<S> {
    fn list_conversations(
        &self,
        owner: &OwnerRef,
    ) -> BoxedFuture<Vec<ConversationEntry>> {
        let fut = self.0.list_conversations(owner);
        Box::pin(
            async move {
                let entries = fut.await.map_err(|err| {
                    error!("got an error: {err:?}");
                    Error::from_store(&err)
                })?;
                trace!("listed {} conversations", entries.len());
                Ok(entries)
            }
            .instrument(trace_span!("store list")),
        )
    }

    fn get_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
    ) -> BoxedFuture<ChatFile> {
        let fut = self.0.get_conversation(owner, id);
        Box::pin(
            async move {
                fut.await.map_err(|err| {
                    error!("got an error: {err:?}");
                    Error::from_store(&err)
                })
            }
            .instrument(trace_span!("store get", id = %id)),
        )
    }

    fn save_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
        file: &ChatFile,
    ) -> BoxedFuture<()> {
        let fut = self.0.save_conversation(owner, id, file);
        Box::pin(
            async move {
                fut.await.map_err(|err| {
                    error!("got an error: {err:?}");
                    Error::from_store(&err)
                })
            }
            .instrument(trace_span!("store save", id = %id)),
        )
    }
}

/// A type-erased handle to a chat store.
///
/// Store errors are converted into [`Error`] so that the rest of the
/// crate doesn't need to be generic over the store.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn StoreObject>,
}

impl StoreClient {
    /// Wraps a chat store.
    #[inline]
    pub fn new<S: ChatStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(AnyStore(store)),
        }
    }

    /// Lists the conversations that belong to `owner`.
    #[inline]
    pub async fn list_conversations(
        &self,
        owner: &OwnerRef,
    ) -> Result<Vec<ConversationEntry>, Error> {
        self.store.list_conversations(owner).await
    }

    /// Fetches the metadata and messages of a conversation.
    #[inline]
    pub async fn get_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
    ) -> Result<ChatFile, Error> {
        self.store.get_conversation(owner, id).await
    }

    /// Writes a whole conversation, overwriting whatever is stored.
    #[inline]
    pub async fn save_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
        file: &ChatFile,
    ) -> Result<(), Error> {
        self.store.save_conversation(owner, id, file).await
    }
}
