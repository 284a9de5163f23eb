pub mod defs;
pub mod memory;
pub mod state;

pub use memory::{MemoryContentStream, MemoryKeyValueStore, MemoryPost, StaticPreferences};
pub use state::SqliteKeyValueStore;
