pub mod memory;
pub mod persistence;
pub mod table;

pub use memory::TableStore;
pub use persistence::{SnapshotManager, StoreSnapshot};
pub use table::Table;
