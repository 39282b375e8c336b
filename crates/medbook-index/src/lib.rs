//! Persistent vector collection over LanceDB.
//!
//! [`IndexStore`] owns the build-or-reuse lifecycle of one named collection;
//! [`VectorIndex`] is the read-only query handle it yields.

pub mod schema;
pub mod store;

pub use store::{IndexStore, VectorIndex};
