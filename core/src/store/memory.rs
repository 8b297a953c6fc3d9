//! In-memory store implementations for tests and single-process runs.
//!
//! Maps live behind `parking_lot::RwLock`. Each store can be switched offline to
//! act like an unreachable backend, or made to fail individual operations, and it
//! counts open sessions so callers can check that every session was released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::{Ad, AdId, Campaign, CampaignId};

use super::{KeyValueSession, KeyValueStore, RelationalSession, RelationalStore};

#[derive(Default)]
struct Health {
    offline: AtomicBool,
    failing: AtomicBool,
    open_sessions: AtomicUsize,
}

impl Health {
    fn open(&self, store: &'static str) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::connection(store, "store is offline"));
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }

    fn check(&self, store: &'static str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::operation(store, "injected failure"));
        }
        Ok(())
    }
}

/// Relational records held in hash maps.
#[derive(Default)]
pub struct MemoryStore {
    ads: RwLock<HashMap<AdId, Ad>>,
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
    health: Health,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.health.offline.store(!available, Ordering::SeqCst);
    }

    /// Make every read and write on open sessions fail.
    pub fn set_failing(&self, failing: bool) {
        self.health.failing.store(failing, Ordering::SeqCst);
    }

    pub fn open_sessions(&self) -> usize {
        self.health.open_sessions.load(Ordering::SeqCst)
    }

    pub fn ad_count(&self) -> usize {
        self.ads.read().len()
    }

    pub fn campaign(&self, campaign_id: CampaignId) -> Option<Campaign> {
        self.campaigns.read().get(&campaign_id).cloned()
    }
}

struct MemorySession<'a> {
    store: &'a MemoryStore,
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        self.store.health.close();
    }
}

const RECORDS: &str = "memory records";

impl RelationalStore for MemoryStore {
    fn session(&self) -> Result<Box<dyn RelationalSession + '_>, StoreError> {
        self.health.open(RECORDS)?;
        Ok(Box::new(MemorySession { store: self }))
    }
}

impl RelationalSession for MemorySession<'_> {
    fn add_ad(&self, ad: &Ad) -> Result<(), StoreError> {
        self.store.health.check(RECORDS)?;
        self.store.ads.write().insert(ad.ad_id, ad.clone());
        Ok(())
    }

    fn add_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.store.health.check(RECORDS)?;
        self.store.campaigns.write().insert(campaign.campaign_id, campaign.clone());
        Ok(())
    }

    fn get_ad(&self, ad_id: AdId) -> Result<Option<Ad>, StoreError> {
        self.store.health.check(RECORDS)?;
        Ok(self.store.ads.read().get(&ad_id).cloned())
    }
}

/// One key-value namespace: key -> values in append order.
pub struct MemoryMultiMap {
    name: &'static str,
    entries: RwLock<HashMap<String, Vec<String>>>,
    health: Health,
}

impl MemoryMultiMap {
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: RwLock::new(HashMap::new()), health: Health::default() }
    }

    pub fn set_available(&self, available: bool) {
        self.health.offline.store(!available, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.health.failing.store(failing, Ordering::SeqCst);
    }

    pub fn open_sessions(&self) -> usize {
        self.health.open_sessions.load(Ordering::SeqCst)
    }

    pub fn key_count(&self) -> usize {
        self.entries.read().len()
    }
}

struct MultiMapSession<'a> {
    map: &'a MemoryMultiMap,
}

impl Drop for MultiMapSession<'_> {
    fn drop(&mut self) {
        self.map.health.close();
    }
}

impl KeyValueStore for MemoryMultiMap {
    fn session(&self) -> Result<Box<dyn KeyValueSession + '_>, StoreError> {
        self.health.open(self.name)?;
        Ok(Box::new(MultiMapSession { map: self }))
    }
}

impl KeyValueSession for MultiMapSession<'_> {
    fn append(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map.health.check(self.map.name)?;
        self.map.entries.write().entry(key.to_string()).or_default().push(value.to_string());
        Ok(())
    }

    fn values_for(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.map.health.check(self.map.name)?;
        Ok(self.map.entries.read().get(key).cloned().unwrap_or_default())
    }
}
