//! Record-level access to a CouchDB-style document database.
//!
//! [`Adapter`] translates find / create / update / destroy / merge calls
//! phrased in terms of [`Record`]s and [`Query`]s into the store operations
//! exposed by [`docstore`]. Collections are registered once at startup into
//! the adapter's [`Registry`]; afterwards the adapter is shared read-only.

mod adapter;
mod config;
mod errors;
mod registry;
#[cfg(test)]
mod tests;

pub use docstore::SessionInfo;
pub use record::{DocId, Query, Record, Schema, UnsupportedQuery};

pub use self::{adapter::*, config::*, errors::*, registry::*};
