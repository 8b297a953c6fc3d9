//! Storage seams for the ads engine.
//!
//! Two kinds of backend are consumed:
//!
//! | Trait | Holds |
//! |-------|-------|
//! | [`RelationalStore`] | Ad and Campaign records addressable by id |
//! | [`KeyValueStore`] | an ordered, append-only, duplicate-tolerant multimap of strings |
//!
//! The engine uses one key-value namespace for the inverted index and one for
//! synonyms. Work is done through short-lived sessions: a session is requested at the
//! start of an ingestion phase or a query and released when it is dropped, so release
//! happens on every exit path. Requesting a session is where an unreachable backend
//! shows up, as [`StoreError::Connection`].

pub mod memory;
pub mod sled_store;

use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{Ad, AdId, Campaign};

pub use memory::{MemoryMultiMap, MemoryStore};
pub use sled_store::{SledMultiMap, SledStore};

pub trait RelationalStore: Send + Sync {
    fn session(&self) -> Result<Box<dyn RelationalSession + '_>, StoreError>;
}

pub trait RelationalSession {
    fn add_ad(&self, ad: &Ad) -> Result<(), StoreError>;
    fn add_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;
    /// `Ok(None)` when no record has this id.
    fn get_ad(&self, ad_id: AdId) -> Result<Option<Ad>, StoreError>;
}

pub trait KeyValueStore: Send + Sync {
    fn session(&self) -> Result<Box<dyn KeyValueSession + '_>, StoreError>;
}

pub trait KeyValueSession {
    fn append(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Values in append order; empty when the key was never written.
    fn values_for(&self, key: &str) -> Result<Vec<String>, StoreError>;
}

/// The three backends an [`Engine`](crate::engine::Engine) reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn RelationalStore>,
    pub inverted_index: Arc<dyn KeyValueStore>,
    pub synonyms: Arc<dyn KeyValueStore>,
}

impl Stores {
    /// Fresh in-memory backends.
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(MemoryStore::new()),
            inverted_index: Arc::new(MemoryMultiMap::new("inverted_index")),
            synonyms: Arc::new(MemoryMultiMap::new("synonyms")),
        }
    }

    /// All three backends share one sled database, each namespace in its own tree.
    pub fn sled(store: &SledStore) -> Self {
        Self {
            records: Arc::new(store.clone()),
            inverted_index: Arc::new(store.inverted_index()),
            synonyms: Arc::new(store.synonyms()),
        }
    }
}
