//! A chat store backed by the REST API of a SillyTavern server.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use chat_summary_model::{
    ChatFile, ChatStore, ChatStoreError, ConversationEntry, ConversationId,
    OwnerRef, StoreErrorKind,
};
use mime::Mime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde_json::Value;

pub use config::{HttpStoreConfig, HttpStoreConfigBuilder};

const CSRF_HEADER: &str = "X-CSRF-Token";

/// Error type for [`HttpChatStore`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: StoreErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: StoreErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ChatStoreError for Error {
    #[inline]
    fn kind(&self) -> StoreErrorKind {
        self.kind
    }
}

/// Chat store talking to a SillyTavern server.
#[derive(Clone, Debug)]
pub struct HttpChatStore {
    client: Client,
    config: Arc<HttpStoreConfig>,
}

impl HttpChatStore {
    /// Creates a new `HttpChatStore` with the given configuration.
    #[inline]
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}{path}", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.config.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }
        if let Some((username, password)) = &self.config.basic_auth {
            builder = builder.basic_auth(username, password.as_ref());
        }
        builder
    }
}

impl ChatStore for HttpChatStore {
    type Error = Error;

    fn list_conversations(
        &self,
        owner: &OwnerRef,
    ) -> impl Future<Output = Result<Vec<ConversationEntry>, Self::Error>>
    + Send
    + 'static {
        let (path, body) = proto::list_request(owner);
        let req = self.post(path).json(&body);

        async move {
            let value = read_json(send(req).await?).await?;
            let entries = proto::decode_entries(value);
            debug!("listed {} conversations", entries.len());
            Ok(entries)
        }
    }

    fn get_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
    ) -> impl Future<Output = Result<ChatFile, Self::Error>> + Send + 'static
    {
        let (path, body) = proto::get_request(owner, id);
        let req = self.post(path).json(&body);

        async move {
            let value = read_json(send(req).await?).await?;
            Ok(proto::decode_chat(value))
        }
    }

    fn save_conversation(
        &self,
        owner: &OwnerRef,
        id: &ConversationId,
        file: &ChatFile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let body = proto::save_request(owner, id, file);
        let req = self
            .post(proto::SAVE_PATH)
            .header(header::CACHE_CONTROL, "no-cache")
            .json(&body);

        async move {
            send(req).await?;
            Ok(())
        }
    }
}

async fn send(req: RequestBuilder) -> Result<Response, Error> {
    let resp = req.send().await.map_err(|err| {
        Error::new(format!("{err}"), StoreErrorKind::NetworkFailure)
    })?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let kind = if status == StatusCode::NOT_FOUND {
        StoreErrorKind::NotFound
    } else {
        StoreErrorKind::NetworkFailure
    };
    Err(Error::new(format!("Server responded with {status}: {body}"), kind))
}

async fn read_json(resp: Response) -> Result<Value, Error> {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if let Some(content_type) = content_type.filter(|v| !is_json(v)) {
        return Err(Error::new(
            format!("Unexpected content type: {content_type}"),
            StoreErrorKind::InvalidResponse,
        ));
    }

    resp.json().await.map_err(|err| {
        Error::new(
            format!("Invalid response body: {err}"),
            StoreErrorKind::InvalidResponse,
        )
    })
}

fn is_json(content_type: &str) -> bool {
    content_type
        .parse()
        .map(|m: Mime| {
            m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
        })
        .unwrap_or(false)
}
