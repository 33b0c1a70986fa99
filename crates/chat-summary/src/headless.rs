//! A host without a user interface, backed by a chat store.
//!
//! [`HeadlessHost`] keeps the live state of one conversation in memory
//! and reads and writes it through a [`StoreClient`]. Changes to the live
//! state are written back by [`HeadlessHost::flush_pending`]. Notices, the
//! loading indicator and modal inputs are forwarded as [`HostEvent`]s
//! for a front end to present.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chat_summary_core::{Error, StoreClient};
use chat_summary_model::{
    ActiveChat, ChatFile, ConversationId, Host, HostError, Injection,
    InputRequest, Message, Metadata, Notice, OwnerRef, Settings,
};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// An event for the front end of a [`HeadlessHost`].
#[derive(Debug)]
pub enum HostEvent {
    /// A notice to show.
    Notice(Notice),
    /// The loading indicator was shown (`true`) or hidden (`false`).
    Loader(bool),
    /// A modal input to answer. Dropping the request cancels it.
    Input(InputRequest),
}

struct LiveChat {
    id: ConversationId,
    metadata: Metadata,
    messages: Vec<Message>,
    persisted: bool,
    unsaved: bool,
}

#[derive(Default)]
struct HeadlessState {
    active: Option<LiveChat>,
    injection: Option<Injection>,
    settings: Settings,
    next_chat: u32,
}

/// A host that owns the live state of one conversation at a time.
pub struct HeadlessHost {
    owner: OwnerRef,
    owner_name: String,
    store: StoreClient,
    settings_path: Option<PathBuf>,
    events: UnboundedSender<HostEvent>,
    state: Mutex<HeadlessState>,
}

impl HeadlessHost {
    /// Creates a host for the given owner without an active conversation.
    pub fn new<S: Into<String>>(
        owner: OwnerRef,
        owner_name: S,
        store: StoreClient,
        events: UnboundedSender<HostEvent>,
    ) -> Self {
        Self {
            owner,
            owner_name: owner_name.into(),
            store,
            settings_path: None,
            events,
            state: Default::default(),
        }
    }

    /// Persists the settings as JSON at `path`, loading them if the file
    /// exists.
    pub fn with_settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let path = path.into();
        match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => self.lock().settings = settings,
                Err(err) => {
                    warn!("ignoring settings in {}: {err}", path.display())
                }
            },
            Err(err) => debug!("no settings at {}: {err}", path.display()),
        }
        self.settings_path = Some(path);
        self
    }

    /// Loads a conversation from the store and makes it active.
    pub async fn load_chat(&self, id: &ConversationId) -> Result<(), Error> {
        let file = self.store.get_conversation(&self.owner, id).await?;
        debug!("loaded {id} with {} messages", file.messages.len());
        self.lock().active = Some(LiveChat {
            id: id.clone(),
            metadata: file.metadata,
            messages: file.messages,
            persisted: true,
            unsaved: false,
        });
        Ok(())
    }

    /// Saves the open conversation if its live state changed since it was
    /// loaded or last saved.
    ///
    /// Returns `false` if there was nothing to save.
    pub async fn flush_pending(&self) -> Result<bool, HostError> {
        let unsaved = self
            .lock()
            .active
            .as_ref()
            .is_some_and(|chat| chat.unsaved);
        if !unsaved {
            return Ok(false);
        }
        debug!("saving the live state of the open conversation");
        self.save_chat().await?;
        Ok(true)
    }

    /// Returns the last injection registered.
    #[inline]
    pub fn injection(&self) -> Option<Injection> {
        self.lock().injection.clone()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        // The state is plain data, so a poisoned lock is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[inline]
    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            trace!("no front end is listening");
        }
    }
}

#[async_trait]
impl Host for HeadlessHost {
    fn active_chat(&self) -> Option<ActiveChat> {
        let state = self.lock();
        let active = state.active.as_ref()?;
        Some(ActiveChat {
            id: active.id.clone(),
            owner: self.owner.clone(),
            owner_name: self.owner_name.clone(),
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
            chat.unsaved = true;
        }
    }

    fn update_metadata(&self, key: &str, value: Value) {
        if let Some(chat) = &mut self.lock().active {
            chat.metadata.insert(key.to_owned(), value);
            chat.unsaved = true;
        }
    }

    fn set_injection(&self, injection: Injection) {
        self.lock().injection = Some(injection);
    }

    fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    fn save_settings(&self, settings: Settings) {
        if let Some(path) = &self.settings_path {
            let written = serde_json::to_string_pretty(&settings)
                .map_err(|err| err.to_string())
                .and_then(|json| {
                    fs::write(path, json).map_err(|err| err.to_string())
                });
            if let Err(err) = written {
                error!("failed to write {}: {err}", path.display());
                self.notify(Notice::error("Failed to save the settings."));
            }
        }
        self.lock().settings = settings;
    }

    fn notify(&self, notice: Notice) {
        self.emit(HostEvent::Notice(notice));
    }

    fn show_loader(&self) {
        self.emit(HostEvent::Loader(true));
    }

    fn hide_loader(&self) {
        self.emit(HostEvent::Loader(false));
    }

    fn request_input(&self, request: InputRequest) {
        self.emit(HostEvent::Input(request));
    }

    async fn new_chat(&self) -> Result<ConversationId, HostError> {
        let mut state = self.lock();
        state.next_chat += 1;
        let id = ConversationId::new(format!(
            "{} - new {}",
            self.owner_name, state.next_chat
        ));
        state.active = Some(LiveChat {
            id: id.clone(),
            metadata: Metadata::new(),
            messages: vec![],
            persisted: false,
            unsaved: false,
        });
        Ok(id)
    }

    async fn rename_chat(
        &self,
        from: &ConversationId,
        to: &ConversationId,
    ) -> Result<(), HostError> {
        let mut state = self.lock();
        match &mut state.active {
            Some(chat) if chat.id == *from && !chat.persisted => {
                chat.id = to.clone();
                Ok(())
            }
            _ => Err(HostError::new(format!(
                "only a new, unsaved conversation can be renamed, not {from}"
            ))),
        }
    }

    async fn open_chat(&self, id: &ConversationId) -> Result<(), HostError> {
        let is_active = self
            .lock()
            .active
            .as_ref()
            .is_some_and(|chat| chat.id == *id);
        if is_active {
            return Ok(());
        }
        self.load_chat(id)
            .await
            .map_err(|err| HostError::new(err.to_string()))
    }

    async fn save_chat(&self) -> Result<(), HostError> {
        let (id, file) = {
            let state = self.lock();
            let Some(chat) = &state.active else {
                return Err(HostError::new("no conversation is open"));
            };
            let file = ChatFile {
                metadata: chat.metadata.clone(),
                messages: chat.messages.clone(),
            };
            (chat.id.clone(), file)
        };

        self.store
            .save_conversation(&self.owner, &id, &file)
            .await
            .map_err(|err| HostError::new(err.to_string()))?;
        if let Some(chat) = self
            .lock()
            .active
            .as_mut()
            .filter(|chat| chat.id == id)
        {
            chat.persisted = true;
            chat.unsaved = false;
        }
        Ok(())
    }

    async fn reload_chat(&self) -> Result<(), HostError> {
        let Some(id) = self.active_chat().map(|chat| chat.id) else {
            return Ok(());
        };
        self.load_chat(&id)
            .await
            .map_err(|err| HostError::new(err.to_string()))
    }
}
