//! sled-backed stores. One database holds four trees:
//!
//! - `ads`, `campaigns`: bincode records keyed by big-endian id
//! - `inverted_index`, `synonyms`: multimap namespaces
//!
//! A multimap value is stored under its own key, `len key seq`, where `len` is the
//! key's byte length as a big-endian u32 and `seq` is a big-endian id from
//! [`sled::Db::generate_id`]. The length prefix keeps any key from being a prefix
//! of another, whatever bytes it holds. Ids only grow, so a prefix scan yields the
//! values of one key in append order and duplicates never collide.

use std::cell::Cell;
use std::path::Path;

use sled::{Db, Tree};

use crate::error::StoreError;
use crate::model::{Ad, AdId, Campaign};

use super::{KeyValueSession, KeyValueStore, RelationalSession, RelationalStore};

const ADS: &str = "ads";
const CAMPAIGNS: &str = "campaigns";
const INVERTED_INDEX: &str = "inverted_index";
const SYNONYMS: &str = "synonyms";
const ALL_TREES: [&str; 4] = [ADS, CAMPAIGNS, INVERTED_INDEX, SYNONYMS];

const RECORDS: &str = "sled records";

#[derive(Clone, Debug)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref()).map_err(|e| StoreError::connection(RECORDS, e))?;
        Ok(Self { db })
    }

    /// A database that is deleted when the last handle is dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::connection(RECORDS, e))?;
        Ok(Self { db })
    }

    pub fn inverted_index(&self) -> SledMultiMap {
        SledMultiMap { db: self.db.clone(), tree: INVERTED_INDEX }
    }

    pub fn synonyms(&self) -> SledMultiMap {
        SledMultiMap { db: self.db.clone(), tree: SYNONYMS }
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        for name in ALL_TREES {
            let tree = self.db.open_tree(name).map_err(|e| StoreError::connection(RECORDS, e))?;
            if !tree.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drop every record and index entry.
    pub fn clear(&self) -> Result<(), StoreError> {
        for name in ALL_TREES {
            let tree = self.db.open_tree(name).map_err(|e| StoreError::connection(RECORDS, e))?;
            tree.clear().map_err(|e| StoreError::operation(RECORDS, e))?;
        }
        self.db.flush().map_err(|e| StoreError::operation(RECORDS, e))?;
        Ok(())
    }
}

/// Open trees for one phase or query. Flushes on release if anything was written.
struct SledSession {
    store: &'static str,
    trees: Vec<Tree>,
    dirty: Cell<bool>,
}

impl Drop for SledSession {
    fn drop(&mut self) {
        if !self.dirty.get() {
            return;
        }
        for tree in &self.trees {
            if let Err(e) = tree.flush() {
                tracing::error!(store = self.store, error = %e, "flush on session release failed");
            }
        }
    }
}

struct SledRecords {
    inner: SledSession,
}

impl RelationalStore for SledStore {
    fn session(&self) -> Result<Box<dyn RelationalSession + '_>, StoreError> {
        let ads = self.db.open_tree(ADS).map_err(|e| StoreError::connection(RECORDS, e))?;
        let campaigns = self.db.open_tree(CAMPAIGNS).map_err(|e| StoreError::connection(RECORDS, e))?;
        Ok(Box::new(SledRecords {
            inner: SledSession { store: RECORDS, trees: vec![ads, campaigns], dirty: Cell::new(false) },
        }))
    }
}

impl SledRecords {
    fn ads(&self) -> &Tree { &self.inner.trees[0] }
    fn campaigns(&self) -> &Tree { &self.inner.trees[1] }
}

impl RelationalSession for SledRecords {
    fn add_ad(&self, ad: &Ad) -> Result<(), StoreError> {
        let bytes = bincode::serialize(ad).map_err(|e| StoreError::operation(RECORDS, e))?;
        self.ads()
            .insert(ad.ad_id.to_be_bytes(), bytes)
            .map_err(|e| StoreError::operation(RECORDS, e))?;
        self.inner.dirty.set(true);
        Ok(())
    }

    fn add_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let bytes = bincode::serialize(campaign).map_err(|e| StoreError::operation(RECORDS, e))?;
        self.campaigns()
            .insert(campaign.campaign_id.to_be_bytes(), bytes)
            .map_err(|e| StoreError::operation(RECORDS, e))?;
        self.inner.dirty.set(true);
        Ok(())
    }

    fn get_ad(&self, ad_id: AdId) -> Result<Option<Ad>, StoreError> {
        let Some(bytes) = self.ads().get(ad_id.to_be_bytes()).map_err(|e| StoreError::operation(RECORDS, e))? else {
            return Ok(None);
        };
        let ad = bincode::deserialize(&bytes).map_err(|e| StoreError::operation(RECORDS, e))?;
        Ok(Some(ad))
    }
}

/// A multimap namespace living in one tree of a [`SledStore`].
#[derive(Clone)]
pub struct SledMultiMap {
    db: Db,
    tree: &'static str,
}

struct SledMultiMapSession {
    db: Db,
    inner: SledSession,
}

impl KeyValueStore for SledMultiMap {
    fn session(&self) -> Result<Box<dyn KeyValueSession + '_>, StoreError> {
        let tree = self.db.open_tree(self.tree).map_err(|e| StoreError::connection(self.tree, e))?;
        Ok(Box::new(SledMultiMapSession {
            db: self.db.clone(),
            inner: SledSession { store: self.tree, trees: vec![tree], dirty: Cell::new(false) },
        }))
    }
}

fn key_prefix(store: &'static str, key: &str) -> Result<Vec<u8>, StoreError> {
    let len = u32::try_from(key.len()).map_err(|_| StoreError::operation(store, "key longer than u32::MAX bytes"))?;
    let mut prefix = Vec::with_capacity(key.len() + 12);
    prefix.extend_from_slice(&len.to_be_bytes());
    prefix.extend_from_slice(key.as_bytes());
    Ok(prefix)
}

impl KeyValueSession for SledMultiMapSession {
    fn append(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let store = self.inner.store;
        let seq = self.db.generate_id().map_err(|e| StoreError::operation(store, e))?;
        let mut full_key = key_prefix(store, key)?;
        full_key.extend_from_slice(&seq.to_be_bytes());
        self.inner.trees[0]
            .insert(full_key, value.as_bytes())
            .map_err(|e| StoreError::operation(store, e))?;
        self.inner.dirty.set(true);
        Ok(())
    }

    fn values_for(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let store = self.inner.store;
        let mut values = Vec::new();
        for entry in self.inner.trees[0].scan_prefix(key_prefix(store, key)?) {
            let (_, value) = entry.map_err(|e| StoreError::operation(store, e))?;
            values.push(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip_through_sled() {
        let store = SledStore::temporary().unwrap();
        let session = store.session().unwrap();
        let ad = Ad::new(11, 2, "Waterproof hiking boots");
        session.add_ad(&ad).unwrap();
        assert_eq!(session.get_ad(11).unwrap(), Some(ad));
        assert_eq!(session.get_ad(12).unwrap(), None);
    }

    #[test]
    fn multimap_prefix_does_not_bleed_into_longer_keys() {
        let store = SledStore::temporary().unwrap();
        let index = store.inverted_index();
        let session = index.session().unwrap();
        session.append("shoe", "1").unwrap();
        session.append("shoes", "2").unwrap();
        session.append("shoe", "3").unwrap();
        session.append("shoe", "1").unwrap();
        assert_eq!(session.values_for("shoe").unwrap(), vec!["1", "3", "1"]);
        assert_eq!(session.values_for("shoes").unwrap(), vec!["2"]);
    }

    #[test]
    fn multimap_keys_with_nul_bytes_stay_separate() {
        let store = SledStore::temporary().unwrap();
        let synonyms = store.synonyms();
        let session = synonyms.session().unwrap();
        session.append("a\0b", "x").unwrap();
        session.append("a", "y").unwrap();
        session.append("a\0", "z").unwrap();
        session.append("a", "w").unwrap();
        assert_eq!(session.values_for("a").unwrap(), vec!["y", "w"]);
        assert_eq!(session.values_for("a\0b").unwrap(), vec!["x"]);
        assert_eq!(session.values_for("a\0").unwrap(), vec!["z"]);
        assert!(session.values_for("").unwrap().is_empty());
    }

    #[test]
    fn namespaces_are_independent_and_clearable() {
        let store = SledStore::temporary().unwrap();
        store.synonyms().session().unwrap().append("sneaker", "shoe").unwrap();
        assert!(store.inverted_index().session().unwrap().values_for("sneaker").unwrap().is_empty());
        assert!(!store.is_empty().unwrap());
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.inverted_index().session().unwrap().append("boot", "9").unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.inverted_index().session().unwrap().values_for("boot").unwrap(), vec!["9"]);
    }
}
