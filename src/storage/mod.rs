pub mod catalog;
pub mod engine;
pub mod memory;
pub mod persistence;
pub mod table;

pub use catalog::Catalog;
pub use engine::TransactionalStore;
pub use memory::{MemoryStore, MemoryTransaction};
pub use persistence::{DurabilityMode, SnapshotManager, StoreSnapshot};
pub use table::Table;
