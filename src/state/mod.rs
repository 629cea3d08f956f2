//! State module: the in-memory thought graph and its accessors.
//!
//! # Module Organization
//!
//! - [`base`]: [State], alerts, the push batch and the low-level index writes
//! - [`selectors`]: read-only queries (children, ranks, sorting, attributes, ancestor walks)
//! - [`store`]: [Store], the copy-on-write owner of the current state

mod base;
mod selectors;
mod store;


pub use base::{Alert, AlertKind, ChangeSet, PushBatch, State};
pub use selectors::{rank_between, SortDirection, SortPreference, ALPHABETICAL, SORT_ATTRIBUTE};
pub use store::Store;
