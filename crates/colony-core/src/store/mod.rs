//! Task store: records, state machine, the in-memory store and its sweep policy.

pub mod memory;
pub mod record;
pub mod state;
pub mod sweep;

pub use memory::{StoreSnapshot, TaskStore};
pub use record::TaskRecord;
pub use state::TaskState;
pub use sweep::SweepPolicy;
