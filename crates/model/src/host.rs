use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConversationId, HostError, InputRequest, Message, Metadata, OwnerRef};

/// The conversation currently open in the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActiveChat {
    /// Identifier of the conversation.
    pub id: ConversationId,
    /// The character or group the conversation belongs to.
    pub owner: OwnerRef,
    /// Display name of the owner.
    pub owner_name: String,
}

/// Extension settings persisted by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// The global template that wraps every summary.
    #[serde(rename = "preset", default)]
    pub template: String,
}

/// Severity of a [`Notice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// Something has started or is in progress.
    Info,
    /// A unit of work completed.
    Success,
    /// The user should correct their input.
    Warning,
    /// A unit of work failed.
    Error,
}

/// A transient message shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Notice {
    /// Severity of the notice.
    pub level: NoticeLevel,
    /// Text of the notice.
    pub message: String,
}

impl Notice {
    /// Creates an informational notice.
    #[inline]
    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::with_level(NoticeLevel::Info, message)
    }

    /// Creates a success notice.
    #[inline]
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::with_level(NoticeLevel::Success, message)
    }

    /// Creates a warning notice.
    #[inline]
    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::with_level(NoticeLevel::Warning, message)
    }

    /// Creates an error notice.
    #[inline]
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::with_level(NoticeLevel::Error, message)
    }

    #[inline]
    fn with_level<S: Into<String>>(level: NoticeLevel, message: S) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Where the host places an injected prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InjectionPosition {
    /// Not injected anywhere.
    None,
    /// After the main prompt.
    InPrompt,
    /// Inside the chat history, at a given depth.
    InChat,
    /// Before the main prompt.
    BeforePrompt,
}

/// The role an injected prompt is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InjectionRole {
    /// The system.
    System,
    /// The user.
    User,
    /// The assistant.
    Assistant,
}

/// A block of text registered into the host's model-facing context.
///
/// Registering an injection replaces any previous one with the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Injection {
    /// Stable key of the injection slot.
    pub key: String,
    /// The injected text. Empty text leaves the slot registered but blank.
    pub content: String,
    /// Where the text is placed.
    pub position: InjectionPosition,
    /// Depth or priority at that position.
    pub depth: u32,
    /// Whether the host should scan the text for keyword activations.
    pub scan: bool,
    /// The role the text is attributed to.
    pub role: InjectionRole,
}

/// The host chat application.
///
/// Live state accessors reflect the host's in-memory state, including
/// edits that the host has not saved yet. The asynchronous operations
/// complete only after the host has finished the corresponding step.
#[async_trait]
pub trait Host: Send + Sync {
    /// Returns the conversation currently open, if any.
    fn active_chat(&self) -> Option<ActiveChat>;

    /// Returns the live metadata of the active conversation.
    fn live_metadata(&self) -> Metadata;

    /// Returns the live messages of the active conversation.
    fn live_messages(&self) -> Vec<Message>;

    /// Replaces the live messages of the active conversation.
    fn set_live_messages(&self, messages: Vec<Message>);

    /// Replaces one key of the active conversation's metadata.
    ///
    /// The host is responsible for persisting the change.
    fn update_metadata(&self, key: &str, value: Value);

    /// Registers an injection, replacing the one with the same key.
    fn set_injection(&self, injection: Injection);

    /// Returns the extension settings.
    fn settings(&self) -> Settings;

    /// Replaces and persists the extension settings.
    fn save_settings(&self, settings: Settings);

    /// Shows a transient notice to the user.
    fn notify(&self, notice: Notice);

    /// Shows the long-running operation indicator.
    fn show_loader(&self);

    /// Hides the long-running operation indicator.
    fn hide_loader(&self);

    /// Shows a modal input for the request.
    fn request_input(&self, request: InputRequest);

    /// Creates a new empty conversation for the active owner, makes it
    /// active and returns its temporary identifier.
    async fn new_chat(&self) -> Result<ConversationId, HostError>;

    /// Renames a conversation.
    async fn rename_chat(
        &self,
        from: &ConversationId,
        to: &ConversationId,
    ) -> Result<(), HostError>;

    /// Opens a conversation of the active owner and makes it active.
    async fn open_chat(&self, id: &ConversationId) -> Result<(), HostError>;

    /// Saves the active conversation.
    async fn save_chat(&self) -> Result<(), HostError>;

    /// Reloads the view of the active conversation.
    async fn reload_chat(&self) -> Result<(), HostError>;
}
