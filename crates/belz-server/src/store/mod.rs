//! Collaborator data store.

pub mod memory;
pub mod seed;
mod r#trait;

pub use memory::InMemoryStore;
pub use r#trait::{Collection, Record, RecordStore, StoreError, StoreResult};
pub use seed::{public_user, seed_user, NewUser, MIN_PASSWORD_LEN};
