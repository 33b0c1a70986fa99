//! Core logic of the summary extension: the prompt composer, the
//! per-view conversation cache, the dirty-save pipeline and the
//! conversation migration procedure.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod composer;
mod error;
mod flush;
mod input;
mod loader;
mod migration;
mod session;
mod store_client;
#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind};
pub use flush::FlushReport;
pub use input::ask;
pub use migration::{
    MigrationError, MigrationReport, MigrationStep, filter_visible,
};
pub use session::{
    ConversationRecord, ListingEntry, Prefetch, PrefetchBatch, Services,
    ViewSession,
};
pub use store_client::StoreClient;
