use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// The kind of error that a chat store reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The conversation or its owner doesn't exist.
    NotFound,
    /// The request failed or the server answered with a non-success status.
    NetworkFailure,
    /// The server answered, but the payload could not be understood.
    InvalidResponse,
    /// Any other errors.
    Other,
}

/// An error reported by a [`Host`](crate::Host) operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostError {
    message: String,
}

impl HostError {
    /// Creates a new host error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for HostError {}
