use chat_summary_model::{
    ChatFile, ConversationEntry, ConversationId, OwnerRef,
};
use serde::Serialize;
use serde_json::Value;

pub const SAVE_PATH: &str = "/api/chats/save";

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ListBody<'a> {
    Character { avatar_url: &'a str },
    Group { group_id: &'a str, query: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GetBody<'a> {
    Character {
        ch_name: &'a str,
        file_name: &'a str,
        avatar_url: &'a str,
    },
    Group {
        id: &'a str,
        chat_id: &'a str,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SaveBody<'a> {
    chat: Vec<Value>,
    file_name: &'a str,
    force: bool,
    #[serde(flatten)]
    target: SaveTarget<'a>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
enum SaveTarget<'a> {
    Character { ch_name: &'a str, avatar_url: &'a str },
    Group { is_group: bool, id: &'a str },
}

pub fn list_request(owner: &OwnerRef) -> (&'static str, ListBody<'_>) {
    match owner {
        OwnerRef::Character { avatar, .. } => (
            "/api/characters/chats",
            ListBody::Character { avatar_url: avatar },
        ),
        OwnerRef::Group { id } => (
            "/api/chats/search",
            ListBody::Group {
                group_id: id,
                query: "",
            },
        ),
    }
}

pub fn get_request<'a>(
    owner: &'a OwnerRef,
    id: &'a ConversationId,
) -> (&'static str, GetBody<'a>) {
    match owner {
        OwnerRef::Character { name, avatar } => (
            "/api/chats/get",
            GetBody::Character {
                ch_name: name,
                file_name: id.as_str(),
                avatar_url: avatar,
            },
        ),
        OwnerRef::Group { id: group_id } => (
            "/api/chats/group/get",
            GetBody::Group {
                id: group_id,
                chat_id: id.as_str(),
            },
        ),
    }
}

pub fn save_request<'a>(
    owner: &'a OwnerRef,
    id: &'a ConversationId,
    file: &ChatFile,
) -> SaveBody<'a> {
    let target = match owner {
        OwnerRef::Character { name, avatar } => SaveTarget::Character {
            ch_name: name,
            avatar_url: avatar,
        },
        OwnerRef::Group { id } => SaveTarget::Group { is_group: true, id },
    };
    SaveBody {
        chat: file.to_records(),
        file_name: id.as_str(),
        force: true,
        target,
    }
}

// ------------------------------
// Types received from the server
// ------------------------------

/// Reads a conversation listing, skipping entries without a file name.
///
/// Anything but an array reads as an empty listing.
pub fn decode_entries(value: Value) -> Vec<ConversationEntry> {
    let Value::Array(items) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| item.get("file_name")?.as_str())
        .filter(|file_name| !file_name.is_empty())
        .map(|file_name| ConversationEntry {
            id: ConversationId::new(file_name),
            file_name: file_name.to_owned(),
        })
        .filter(|entry| !entry.id.as_str().is_empty())
        .collect()
}

/// Reads a conversation file. Anything but an array reads as an empty file.
pub fn decode_chat(value: Value) -> ChatFile {
    match value {
        Value::Array(records) => ChatFile::from_records(records),
        _ => ChatFile::default(),
    }
}
