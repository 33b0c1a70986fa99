use chat_summary_model::{
    ActiveChat, ChatFile, ConversationId, Host, Message, Metadata, OwnerRef,
    PromptData,
};

/// A cached conversation: its metadata and messages as last read.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationRecord {
    pub(crate) id: ConversationId,
    pub(crate) display_name: String,
    pub(crate) file_name: String,
    pub(crate) owner: OwnerRef,
    pub(crate) metadata: Metadata,
    pub(crate) messages: Vec<Message>,
}

impl ConversationRecord {
    pub(crate) fn from_live(active: &ActiveChat, host: &dyn Host) -> Self {
        Self {
            id: active.id.clone(),
            display_name: active.id.to_string(),
            file_name: active.id.file_name(),
            owner: active.owner.clone(),
            metadata: host.live_metadata(),
            messages: host.live_messages(),
        }
    }

    pub(crate) fn from_file(
        id: ConversationId,
        file_name: String,
        owner: OwnerRef,
        file: ChatFile,
    ) -> Self {
        Self {
            display_name: id.to_string(),
            id,
            file_name,
            owner,
            metadata: file.metadata,
            messages: file.messages,
        }
    }

    /// Returns the id of the conversation.
    #[inline]
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Returns the name shown in the conversation list.
    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the file name of the conversation.
    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the owner of the conversation.
    #[inline]
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// Returns `true` if the conversation belongs to a group.
    #[inline]
    pub fn is_group(&self) -> bool {
        self.owner.is_group()
    }

    /// Returns the cached metadata.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the cached messages.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Reads the prompt data from the cached metadata.
    #[inline]
    pub fn prompt_data(&self) -> PromptData {
        PromptData::from_metadata(&self.metadata)
    }

    /// Returns the summary text.
    #[inline]
    pub fn summary(&self) -> String {
        self.prompt_data().prompt.unwrap_or_default()
    }

    /// Returns `true` if the summary is not blank.
    #[inline]
    pub fn has_summary(&self) -> bool {
        !self.prompt_data().is_blank()
    }

    pub(crate) fn set_summary(&mut self, text: String) {
        let mut data = self.prompt_data();
        data.prompt = Some(text);
        data.write_to(&mut self.metadata);
    }
}

/// One row of the conversation list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    /// Id of the conversation.
    pub id: ConversationId,
    /// Name shown for the conversation.
    pub display_name: String,
    /// File name of the conversation.
    pub file_name: String,
    /// Whether the conversation has a non-blank summary.
    pub has_summary: bool,
    /// Whether the conversation is shown in the editor.
    pub selected: bool,
}
