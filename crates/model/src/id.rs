use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

const FILE_EXTENSION: &str = ".jsonl";

/// A stable conversation identifier.
///
/// Chat stores and hosts name conversations after their backing files,
/// sometimes with the file extension and sometimes without. The
/// extension is stripped once, when the identifier is constructed, so
/// identifiers can be compared directly everywhere else.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates an identifier from a conversation or file name.
    #[inline]
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        let name = name.as_ref();
        let name = name.strip_suffix(FILE_EXTENSION).unwrap_or(name);
        Self(name.to_owned())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name of the file backing this conversation.
    #[inline]
    pub fn file_name(&self) -> String {
        format!("{}{FILE_EXTENSION}", self.0)
    }
}

impl Display for ConversationId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ConversationId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The character or group that owns a set of conversations.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnerRef {
    /// A single character, addressed by its name and avatar file.
    Character {
        /// Display name of the character.
        name: String,
        /// Avatar file name, which the chat store uses as the key.
        avatar: String,
    },
    /// A group chat.
    Group {
        /// Identifier of the group.
        id: String,
    },
}

impl OwnerRef {
    /// Returns `true` if the owner is a group.
    #[inline]
    pub fn is_group(&self) -> bool {
        matches!(self, OwnerRef::Group { .. })
    }
}
