//! Lazy loading from, and saving to, a persistence provider.
//!
//! The in-memory [crate::state::State] only ever holds part of the graph. Subtrees are pulled
//! on demand with [get_descendant_thoughts] (or [get_many_descendants] for several roots at
//! once), and each fragment is merged with [reconcile]. [SyncQueue] ties these to a
//! [crate::state::Store] and pushes local writes back through [DataProvider::update_thoughts].

mod descendants;
mod memory;
mod provider;
mod queue;
mod reconcile;

pub use descendants::{get_descendant_thoughts, get_many_descendants, PullOptions};
pub use memory::MemoryProvider;
pub use provider::{DataProvider, ThoughtWithChildren};
pub use queue::SyncQueue;
pub use reconcile::reconcile;
