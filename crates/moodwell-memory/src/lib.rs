pub mod file_kv;
pub mod kv;
pub mod sqlite_kv;
pub mod store;

pub use file_kv::FileKv;
pub use kv::{KvBackend, MemoryKv};
pub use sqlite_kv::SqliteKv;
pub use store::{EntryStore, KvEntryStore, LoadOutcome};
