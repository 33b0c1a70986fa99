use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chat_summary_model::{
    ActiveChat, CancelReason, ConversationId, Host, HostError, Injection,
    InputKind, InputRequest, Message, Metadata, Notice, NoticeLevel, OwnerRef,
    Settings,
};
use serde_json::Value;

/// A host operation that can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostOp {
    NewChat,
    RenameChat,
    OpenChat,
    SaveChat,
    ReloadChat,
}

/// A scripted answer to the next modal input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedInput {
    Confirm(String),
    Cancel(CancelReason),
}

/// A snapshot taken when the host saved its active conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedChat {
    pub id: ConversationId,
    pub metadata: Metadata,
    pub messages: Vec<Message>,
}

struct LiveChat {
    id: ConversationId,
    metadata: Metadata,
    messages: Vec<Message>,
}

#[derive(Default)]
struct TestHostState {
    owner: Option<(OwnerRef, String)>,
    active: Option<LiveChat>,
    parked: HashMap<ConversationId, LiveChat>,
    greeting: Option<Message>,
    settings: Settings,
    injections: Vec<Injection>,
    notices: Vec<Notice>,
    loader_depth: i64,
    loader_shows: usize,
    inputs: VecDeque<ScriptedInput>,
    input_kinds: Vec<InputKind>,
    failures: HashSet<HostOp>,
    metadata_updates: Vec<String>,
    saved: Vec<SavedChat>,
    reloads: usize,
    next_chat: u32,
}

/// A scripted host that records everything the extension asks of it.
///
/// Conversations created or switched away from are parked in memory, so
/// they can be opened again by name.
#[derive(Default)]
pub struct TestHost {
    state: Mutex<TestHostState>,
}

impl TestHost {
    /// Creates a host for the given owner without an active conversation.
    pub fn new(owner: OwnerRef, owner_name: &str) -> Self {
        let host = Self::default();
        host.lock().owner = Some((owner, owner_name.to_owned()));
        host
    }

    /// Opens a conversation with the given live state.
    pub fn with_active_chat(
        self,
        id: &str,
        metadata: Metadata,
        messages: Vec<Message>,
    ) -> Self {
        self.lock().active = Some(LiveChat {
            id: ConversationId::new(id),
            metadata,
            messages,
        });
        self
    }

    /// Sets the greeting that every new conversation starts with.
    pub fn with_greeting(self, greeting: Message) -> Self {
        self.lock().greeting = Some(greeting);
        self
    }

    /// Sets the global template.
    pub fn with_template(self, template: &str) -> Self {
        self.lock().settings.template = template.to_owned();
        self
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, TestHostState> {
        self.state.lock().expect("test host is poisoned")
    }

    /// Queues an answer for the next modal input.
    #[inline]
    pub fn script_input(&self, input: ScriptedInput) {
        self.lock().inputs.push_back(input);
    }

    /// Makes every call of the operation fail.
    #[inline]
    pub fn fail(&self, op: HostOp) {
        self.lock().failures.insert(op);
    }

    /// Returns every injection registered so far.
    #[inline]
    pub fn injections(&self) -> Vec<Injection> {
        self.lock().injections.clone()
    }

    /// Returns the content of the most recent injection.
    #[inline]
    pub fn injected_text(&self) -> Option<String> {
        self.lock().injections.last().map(|i| i.content.clone())
    }

    /// Returns every notice shown so far.
    #[inline]
    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    /// Returns the messages of the notices with the given level.
    pub fn notices_with(&self, level: NoticeLevel) -> Vec<String> {
        self.lock()
            .notices
            .iter()
            .filter(|notice| notice.level == level)
            .map(|notice| notice.message.clone())
            .collect()
    }

    /// Returns how many loaders are currently shown.
    #[inline]
    pub fn loader_depth(&self) -> i64 {
        self.lock().loader_depth
    }

    /// Returns how many times the loader has been shown.
    #[inline]
    pub fn loader_shows(&self) -> usize {
        self.lock().loader_shows
    }

    /// Returns the kinds of modal inputs requested so far.
    #[inline]
    pub fn input_kinds(&self) -> Vec<InputKind> {
        self.lock().input_kinds.clone()
    }

    /// Returns the metadata keys updated so far, in order.
    #[inline]
    pub fn metadata_updates(&self) -> Vec<String> {
        self.lock().metadata_updates.clone()
    }

    /// Returns the snapshots of every save of the active conversation.
    #[inline]
    pub fn saved(&self) -> Vec<SavedChat> {
        self.lock().saved.clone()
    }

    /// Returns how many times the view was reloaded.
    #[inline]
    pub fn reloads(&self) -> usize {
        self.lock().reloads
    }

    fn check(&self, op: HostOp) -> Result<(), HostError> {
        if self.lock().failures.contains(&op) {
            return Err(HostError::new(format!("{op:?} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Host for TestHost {
    fn active_chat(&self) -> Option<ActiveChat> {
        let state = self.lock();
        let (owner, owner_name) = state.owner.clone()?;
        let active = state.active.as_ref()?;
        Some(ActiveChat {
            id: active.id.clone(),
            owner,
            owner_name,
        })
    }

    fn live_metadata(&self) -> Metadata {
        self.lock()
            .active
            .as_ref()
            .map(|chat| chat.metadata.clone())
            .unwrap_or_default()
    }

    fn live_messages(&self) -> Vec<Message> {
        self.lock()
            .active
            .as_ref()
            .map(|chat| chat.messages.clone())
            .unwrap_or_default()
    }

    fn set_live_messages(&self, messages: Vec<Message>) {
        if let Some(chat) = &mut self.lock().active {
            chat.messages = messages;
        }
    }

    fn update_metadata(&self, key: &str, value: Value) {
        let mut state = self.lock();
        state.metadata_updates.push(key.to_owned());
        if let Some(chat) = &mut state.active {
            chat.metadata.insert(key.to_owned(), value);
        }
    }

    fn set_injection(&self, injection: Injection) {
        self.lock().injections.push(injection);
    }

    fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    fn save_settings(&self, settings: Settings) {
        self.lock().settings = settings;
    }

    fn notify(&self, notice: Notice) {
        self.lock().notices.push(notice);
    }

    fn show_loader(&self) {
        let mut state = self.lock();
        state.loader_depth += 1;
        state.loader_shows += 1;
    }

    fn hide_loader(&self) {
        self.lock().loader_depth -= 1;
    }

    fn request_input(&self, request: InputRequest) {
        self.lock().input_kinds.push(request.kind());

        let mut request = request;
        loop {
            let Some(input) = self.lock().inputs.pop_front() else {
                // Nothing scripted, the modal is dismissed.
                return;
            };
            match input {
                ScriptedInput::Confirm(value) => match request.confirm(value) {
                    Ok(()) => return,
                    Err(refused) => {
                        self.notify(Notice::warning("name must not be empty"));
                        request = refused;
                    }
                },
                ScriptedInput::Cancel(reason) => {
                    request.cancel(reason);
                    return;
                }
            }
        }
    }

    async fn new_chat(&self) -> Result<ConversationId, HostError> {
        self.check(HostOp::NewChat)?;
        let mut state = self.lock();
        state.next_chat += 1;
        let owner_name = state
            .owner
            .as_ref()
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
        let id = ConversationId::new(format!(
            "{owner_name} - new {}",
            state.next_chat
        ));
        let messages = state.greeting.clone().into_iter().collect();
        let chat = LiveChat {
            id: id.clone(),
            metadata: Metadata::new(),
            messages,
        };
        if let Some(previous) = state.active.replace(chat) {
            state.parked.insert(previous.id.clone(), previous);
        }
        Ok(id)
    }

    async fn rename_chat(
        &self,
        from: &ConversationId,
        to: &ConversationId,
    ) -> Result<(), HostError> {
        self.check(HostOp::RenameChat)?;
        let mut state = self.lock();
        if let Some(chat) = state.active.as_mut().filter(|chat| chat.id == *from)
        {
            chat.id = to.clone();
            return Ok(());
        }
        let Some(mut chat) = state.parked.remove(from) else {
            return Err(HostError::new(format!("{from} not found")));
        };
        chat.id = to.clone();
        state.parked.insert(to.clone(), chat);
        Ok(())
    }

    async fn open_chat(&self, id: &ConversationId) -> Result<(), HostError> {
        self.check(HostOp::OpenChat)?;
        let mut state = self.lock();
        if state.active.as_ref().is_some_and(|chat| chat.id == *id) {
            return Ok(());
        }
        let Some(chat) = state.parked.remove(id) else {
            return Err(HostError::new(format!("{id} not found")));
        };
        if let Some(previous) = state.active.replace(chat) {
            state.parked.insert(previous.id.clone(), previous);
        }
        Ok(())
    }

    async fn save_chat(&self) -> Result<(), HostError> {
        self.check(HostOp::SaveChat)?;
        let mut state = self.lock();
        let Some(chat) = &state.active else {
            return Err(HostError::new("no active chat"));
        };
        let saved = SavedChat {
            id: chat.id.clone(),
            metadata: chat.metadata.clone(),
            messages: chat.messages.clone(),
        };
        state.saved.push(saved);
        Ok(())
    }

    async fn reload_chat(&self) -> Result<(), HostError> {
        self.check(HostOp::ReloadChat)?;
        self.lock().reloads += 1;
        Ok(())
    }
}
