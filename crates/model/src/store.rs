use std::error::Error;

use crate::{ChatFile, ConversationId, OwnerRef, StoreErrorKind};

/// The error type for a chat store.
pub trait ChatStoreError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> StoreErrorKind;
}

/// A conversation known to the chat store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationEntry {
    /// Identifier of the conversation.
    pub id: ConversationId,
    /// The file name as the store reported it.
    pub file_name: String,
}

/// A type that represents the remote chat store, which persists
/// conversations as files grouped by their owner.
///
/// Stores are thin I/O boundaries. Once created, a store should behave
/// like a stateless object, and the returned futures must not borrow
/// from it.
pub trait ChatStore: Send + Sync {
    /// The error type that may be returned by the store.
    type Error: ChatStoreError;

    /// Lists the conversations that belong to `owner`.
    fn list_conversations(
        &self,
        owner: &OwnerRef,
    ) -> impl Future<Output = Result<Vec<ConversationEntry>, Self::Error>>
    + Send
    + 'static;

    /// Fetches the metadata and messages of a conversation.
    fn get_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
    ) -> impl Future<Output = Result<ChatFile, Self::Error>> + Send + 'static;

    /// Writes a whole conversation, overwriting whatever is stored.
    fn save_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
        file: &ChatFile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;
}
