//! Boundary types shared by every part of the summary extension.
//!
//! The extension sits between two collaborators it does not own: the
//! host chat application (live conversation state, prompt injections,
//! modals, notices) and the remote chat store (conversation files). This
//! crate describes both of them as traits, together with the data that
//! crosses those boundaries.
//!
//! Types in this crate don't implement any extension behavior. They are
//! the constraints that hosts and stores should adhere to, and the
//! vocabulary the core crate is written in.

#![deny(missing_docs)]

mod chat_file;
mod error;
mod host;
mod id;
mod input;
mod message;
mod prompt_data;
mod store;

pub use chat_file::*;
pub use error::*;
pub use host::*;
pub use id::*;
pub use input::*;
pub use message::*;
pub use prompt_data::*;
pub use store::*;
