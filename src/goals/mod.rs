//! Goals are persisted through [store::GoalStore].
//! The basic idea is:
//!  - All goals are kept in one blob under a single named slot ([slot::BlobSlot]).
//!  - Every save rewrites the whole blob, so readers never see a partial collection.
//!  - Progress is stored per local day, history is kept forever.

pub mod error;
pub mod record;
pub mod slot;
pub mod store;
