//! The ads engine: one ingestion pass, then read-only synonym-aware retrieval.
//!
//! ```text
//! Uninitialized --ingest--> Ingesting --> Ready
//! ```
//!
//! [`Engine::attach`] starts directly in `Ready` over stores that were populated by an
//! earlier process. Queries never fail because of the stores: a [`Selection`] carries
//! whatever was found together with the store errors met along the way.

use std::collections::HashSet;
use std::io::BufRead;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{EngineError, StoreError};
use crate::ingest::{IngestPaths, IngestReport, Ingestor};
use crate::model::{Ad, AdId};
use crate::store::{KeyValueSession, RelationalSession, Stores};
use crate::tokenizer::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Uninitialized,
    Ingesting,
    Ready,
}

/// Point in time after which store calls are no longer started.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now().checked_add(timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self) -> Result<(), StoreError> {
        if self.expired() { Err(StoreError::DeadlineExceeded) } else { Ok(()) }
    }
}

/// Ads in discovery order, plus the store failures that may have hidden others.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    pub ads: Vec<Ad>,
    pub errors: Vec<StoreError>,
}

impl Selection {
    /// True when every store call succeeded, so an empty result really means no match.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Engine {
    stores: Stores,
    state: Mutex<EngineState>,
}

impl Engine {
    pub fn new(stores: Stores) -> Self {
        Self { stores, state: Mutex::new(EngineState::Uninitialized) }
    }

    /// An engine over stores that already hold an ingested corpus.
    pub fn attach(stores: Stores) -> Self {
        Self { stores, state: Mutex::new(EngineState::Ready) }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn ingest<S: BufRead, C: BufRead, A: BufRead>(
        &self,
        synonyms: S,
        campaigns: C,
        ads: A,
    ) -> Result<IngestReport, EngineError> {
        self.ingest_with(|ingestor| ingestor.run(synonyms, campaigns, ads))
    }

    pub fn ingest_paths(&self, paths: &IngestPaths) -> Result<IngestReport, EngineError> {
        self.ingest_with(|ingestor| ingestor.run_paths(paths))
    }

    fn ingest_with(&self, run: impl FnOnce(Ingestor<'_>) -> IngestReport) -> Result<IngestReport, EngineError> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Uninitialized {
                return Err(EngineError::AlreadyIngested);
            }
            *state = EngineState::Ingesting;
        }
        tracing::info!("ingestion started");
        let _ready = ReadyOnDrop(&self.state);
        let report = run(Ingestor::new(&self.stores));
        tracing::info!("engine ready");
        Ok(report)
    }

    pub fn select_ads(&self, query: &str) -> Result<Selection, EngineError> {
        self.select_ads_within(query, Deadline::none())
    }

    /// Resolve `query` to ads. Results are ordered by first discovery: query keyword
    /// order, and for each keyword its direct matches before its synonym matches.
    /// Each ad appears at most once.
    pub fn select_ads_within(&self, query: &str, deadline: Deadline) -> Result<Selection, EngineError> {
        if self.state() != EngineState::Ready {
            return Err(EngineError::NotReady);
        }
        let mut selection = Selection::default();
        let keywords = tokenize(query);
        if keywords.is_empty() {
            return Ok(selection);
        }

        let index = match self.stores.inverted_index.session() {
            Ok(s) => s,
            Err(e) => return Ok(unavailable(selection, e)),
        };
        let synonyms = match self.stores.synonyms.session() {
            Ok(s) => s,
            Err(e) => return Ok(unavailable(selection, e)),
        };
        let records = match self.stores.records.session() {
            Ok(s) => s,
            Err(e) => return Ok(unavailable(selection, e)),
        };

        let mut resolver = Resolver {
            index: index.as_ref(),
            synonyms: synonyms.as_ref(),
            records: records.as_ref(),
            deadline,
            seen: HashSet::new(),
            selection: &mut selection,
        };
        for keyword in &keywords {
            if let Err(e) = resolver.keyword(keyword) {
                tracing::warn!(query, keyword = %keyword, error = %e, "query stopped early");
                resolver.selection.errors.push(e);
                break;
            }
        }
        tracing::debug!(query, keywords = keywords.len(), hits = selection.ads.len(), "query resolved");
        Ok(selection)
    }

    /// Fetch one ad record by id.
    pub fn get_ad(&self, ad_id: AdId) -> Result<Option<Ad>, EngineError> {
        if self.state() != EngineState::Ready {
            return Err(EngineError::NotReady);
        }
        let records = self.stores.records.session()?;
        Ok(records.get_ad(ad_id)?)
    }
}

/// Leaves `Ingesting` however ingestion ends. After a panic the stores keep whatever
/// was written and are served as they are; ingestion is not retried.
struct ReadyOnDrop<'a>(&'a Mutex<EngineState>);

impl Drop for ReadyOnDrop<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("ingestion panicked, serving the partially ingested corpus");
        }
        *self.0.lock() = EngineState::Ready;
    }
}

fn unavailable(mut selection: Selection, err: StoreError) -> Selection {
    tracing::error!(error = %err, "store unreachable, returning empty selection");
    selection.errors.push(err);
    selection
}

struct Resolver<'s> {
    index: &'s dyn KeyValueSession,
    synonyms: &'s dyn KeyValueSession,
    records: &'s dyn RelationalSession,
    deadline: Deadline,
    seen: HashSet<AdId>,
    selection: &'s mut Selection,
}

impl Resolver<'_> {
    /// `Err` only when the deadline passed; other store failures are recorded and skipped.
    fn keyword(&mut self, keyword: &str) -> Result<(), StoreError> {
        self.matches(keyword)?;
        self.deadline.check()?;
        let expansions = match self.synonyms.values_for(keyword) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(keyword, error = %e, "synonym lookup failed");
                self.selection.errors.push(e);
                return Ok(());
            }
        };
        for synonym in &expansions {
            self.matches(synonym)?;
        }
        Ok(())
    }

    fn matches(&mut self, key: &str) -> Result<(), StoreError> {
        self.deadline.check()?;
        let ids = match self.index.values_for(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(key, error = %e, "index lookup failed");
                self.selection.errors.push(e);
                return Ok(());
            }
        };
        for raw in ids {
            let Ok(ad_id) = raw.parse::<AdId>() else {
                tracing::warn!(key, value = %raw, "index entry is not an ad id");
                continue;
            };
            if self.seen.contains(&ad_id) {
                continue;
            }
            self.deadline.check()?;
            match self.records.get_ad(ad_id) {
                Ok(Some(ad)) => {
                    self.seen.insert(ad_id);
                    self.selection.ads.push(ad);
                }
                Ok(None) => {
                    tracing::warn!(ad_id, key, "indexed ad has no record");
                    self.seen.insert(ad_id);
                }
                Err(e) => {
                    tracing::error!(ad_id, error = %e, "ad fetch failed");
                    self.selection.errors.push(e);
                }
            }
        }
        Ok(())
    }
}
