use std::error::Error as StdError;
use std::fmt::{self, Display};

use chat_summary_model::{ChatStoreError, HostError, StoreErrorKind};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A conversation or record is missing.
    NotFound,
    /// The chat store could not be reached or refused the request.
    NetworkFailure,
    /// A required user input is empty.
    ValidationFailure,
    /// A host operation failed.
    Host,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::NetworkFailure => write!(f, "Network failure"),
            ErrorKind::ValidationFailure => write!(f, "Validation failure"),
            ErrorKind::Host => write!(f, "Host failure"),
        }
    }
}

/// Describes a failed operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates a new error.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new error with the `NotFound` kind.
    #[inline]
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a new error with the `ValidationFailure` kind.
    #[inline]
    pub fn validation_failure<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ValidationFailure, message)
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_store<E: ChatStoreError + ?Sized>(err: &E) -> Self {
        let kind = match err.kind() {
            StoreErrorKind::NotFound => ErrorKind::NotFound,
            StoreErrorKind::NetworkFailure
            | StoreErrorKind::InvalidResponse
            | StoreErrorKind::Other => ErrorKind::NetworkFailure,
        };
        Self::new(kind, format!("{err}"))
    }
}

impl From<HostError> for Error {
    #[inline]
    fn from(err: HostError) -> Self {
        Self::new(ErrorKind::Host, err.message())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}
