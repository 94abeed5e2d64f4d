//! Storage layer for civic-desk.
//!
//! All state lives in a [`DataStore`]: five in-memory collections mirrored to
//! a [`KeyValueStore`] as one JSON document per collection. Access goes
//! through one repository trait per concern (see [`repositories`]).

pub mod backend;
pub mod entities;
pub mod repositories;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use civic_common::{AppResult, Config};

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use store::{Collection, DataStore, Saved, SharedStore, StoreOptions};

/// Open the file-backed store named by the configuration and load it.
pub fn init(config: &Config) -> AppResult<SharedStore> {
    let backend = FileStore::open(&config.storage.data_dir)?;
    let mut store =
        DataStore::with_system_clock(Arc::new(backend), StoreOptions::from_config(config));
    store.load()?;
    Ok(store.into_shared())
}
