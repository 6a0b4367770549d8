//! Client-side persistence.
//!
//! A [`KeyValueStore`] holds string values under string keys and outlives
//! the process. [`LocalCodeStore`] layers the saved-codes list and the
//! approval flag on top of it.

pub mod codes;
pub mod file;
pub mod memory;

pub use codes::LocalCodeStore;
pub use file::FileKvStore;
pub use memory::MemoryKvStore;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
