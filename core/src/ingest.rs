//! Batch ingestion of the synonyms, campaigns and ads corpora.
//!
//! Phases run in that fixed order because ads reference campaigns. Each phase opens
//! the sessions it needs once and holds them until it returns. A bad line is skipped
//! and a failed write is counted; neither stops the phase. A store that cannot be
//! reached when a phase starts makes that phase a no-op, and the later phases still run.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::error::StoreError;
use crate::model::CampaignId;
use crate::parser::{parse_ad, parse_campaign, parse_synonym};
use crate::store::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Synonyms,
    Campaigns,
    Ads,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Synonyms => "synonyms",
            Phase::Campaigns => "campaigns",
            Phase::Ads => "ads",
        })
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PhaseReport {
    /// Non-blank lines read, including `[` / `]` delimiters.
    pub lines: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub store_errors: usize,
    #[serde(serialize_with = "display_opt")]
    pub connection_error: Option<StoreError>,
    /// The source could not be opened or read to the end.
    pub source_error: Option<String>,
}

impl PhaseReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.store_errors == 0 && self.connection_error.is_none() && self.source_error.is_none()
    }
}

fn display_opt<S: serde::Serializer>(err: &Option<StoreError>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match err {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    pub synonyms: PhaseReport,
    pub campaigns: PhaseReport,
    pub ads: PhaseReport,
}

/// Locations of the three input corpora.
#[derive(Debug, Clone)]
pub struct IngestPaths {
    pub synonyms: PathBuf,
    pub campaigns: PathBuf,
    pub ads: PathBuf,
}

fn open_source(phase: Phase, path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {phase} source {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Sole writer of the record store and both key-value namespaces.
pub struct Ingestor<'a> {
    stores: &'a Stores,
    known_campaigns: HashSet<CampaignId>,
}

impl<'a> Ingestor<'a> {
    pub fn new(stores: &'a Stores) -> Self {
        Self { stores, known_campaigns: HashSet::new() }
    }

    pub fn run<S: BufRead, C: BufRead, A: BufRead>(mut self, synonyms: S, campaigns: C, ads: A) -> IngestReport {
        let report = IngestReport {
            synonyms: self.ingest_synonyms(synonyms),
            campaigns: self.ingest_campaigns(campaigns),
            ads: self.ingest_ads(ads),
        };
        log_report(&report);
        report
    }

    /// Like [`run`](Self::run), reading from files. A file that cannot be opened
    /// only empties its own phase.
    pub fn run_paths(mut self, paths: &IngestPaths) -> IngestReport {
        let report = IngestReport {
            synonyms: match open_source(Phase::Synonyms, &paths.synonyms) {
                Ok(r) => self.ingest_synonyms(r),
                Err(e) => source_failure(Phase::Synonyms, e),
            },
            campaigns: match open_source(Phase::Campaigns, &paths.campaigns) {
                Ok(r) => self.ingest_campaigns(r),
                Err(e) => source_failure(Phase::Campaigns, e),
            },
            ads: match open_source(Phase::Ads, &paths.ads) {
                Ok(r) => self.ingest_ads(r),
                Err(e) => source_failure(Phase::Ads, e),
            },
        };
        log_report(&report);
        report
    }

    pub fn ingest_synonyms<R: BufRead>(&mut self, source: R) -> PhaseReport {
        let mut report = PhaseReport::default();
        let table = match self.stores.synonyms.session() {
            Ok(s) => s,
            Err(e) => return unreachable_store(Phase::Synonyms, e),
        };
        let source_error = for_each_line(Phase::Synonyms, source, |line_no, line| {
            report.lines += 1;
            let Ok(entry) = parse_synonym(line, line_no) else {
                report.skipped += 1;
                return;
            };
            let mut failed = false;
            for synonym in &entry.synonyms {
                if let Err(e) = table.append(&entry.word, synonym) {
                    tracing::error!(line = line_no, word = %entry.word, error = %e, "synonym append failed");
                    report.store_errors += 1;
                    failed = true;
                }
            }
            if !failed {
                report.ingested += 1;
            }
        });
        report.source_error = source_error;
        report
    }

    pub fn ingest_campaigns<R: BufRead>(&mut self, source: R) -> PhaseReport {
        let mut report = PhaseReport::default();
        let records = match self.stores.records.session() {
            Ok(s) => s,
            Err(e) => return unreachable_store(Phase::Campaigns, e),
        };
        let known = &mut self.known_campaigns;
        let source_error = for_each_line(Phase::Campaigns, source, |line_no, line| {
            report.lines += 1;
            let Ok(campaign) = parse_campaign(line, line_no) else {
                report.skipped += 1;
                return;
            };
            match records.add_campaign(&campaign) {
                Ok(()) => {
                    known.insert(campaign.campaign_id);
                    report.ingested += 1;
                }
                Err(e) => {
                    tracing::error!(line = line_no, campaign_id = campaign.campaign_id, error = %e, "campaign insert failed");
                    report.store_errors += 1;
                }
            }
        });
        report.source_error = source_error;
        report
    }

    /// Ads whose campaign was not ingested earlier are still stored and indexed;
    /// the stores do not enforce the reference, so it is only reported.
    pub fn ingest_ads<R: BufRead>(&mut self, source: R) -> PhaseReport {
        let mut report = PhaseReport::default();
        let records = match self.stores.records.session() {
            Ok(s) => s,
            Err(e) => return unreachable_store(Phase::Ads, e),
        };
        let index = match self.stores.inverted_index.session() {
            Ok(s) => s,
            Err(e) => return unreachable_store(Phase::Ads, e),
        };
        let known = &self.known_campaigns;
        let source_error = for_each_line(Phase::Ads, source, |line_no, line| {
            report.lines += 1;
            if matches!(line.trim(), "[" | "]") {
                return;
            }
            let Ok(ad) = parse_ad(line, line_no) else {
                report.skipped += 1;
                return;
            };
            if !known.contains(&ad.campaign_id) {
                tracing::warn!(line = line_no, ad_id = ad.ad_id, campaign_id = ad.campaign_id, "ad references unknown campaign");
            }
            if let Err(e) = records.add_ad(&ad) {
                tracing::error!(line = line_no, ad_id = ad.ad_id, error = %e, "ad insert failed");
                report.store_errors += 1;
                return;
            }
            let id = ad.ad_id.to_string();
            let mut failed = false;
            for keyword in &ad.key_words {
                if let Err(e) = index.append(keyword, &id) {
                    tracing::error!(line = line_no, ad_id = ad.ad_id, keyword = %keyword, error = %e, "index append failed");
                    report.store_errors += 1;
                    failed = true;
                }
            }
            if !failed {
                report.ingested += 1;
            }
        });
        report.source_error = source_error;
        report
    }
}

fn unreachable_store(phase: Phase, err: StoreError) -> PhaseReport {
    tracing::error!(%phase, error = %err, "store unreachable, skipping phase");
    PhaseReport { connection_error: Some(err), ..PhaseReport::default() }
}

fn source_failure(phase: Phase, err: anyhow::Error) -> PhaseReport {
    tracing::error!(%phase, error = %format!("{err:#}"), "source unavailable, skipping phase");
    PhaseReport { source_error: Some(format!("{err:#}")), ..PhaseReport::default() }
}

/// Feed every non-blank line to `f` with its 1-based line number. Invalid UTF-8 is
/// replaced rather than rejected. Returns the read error that ended the source early.
fn for_each_line<R: BufRead>(phase: Phase, source: R, mut f: impl FnMut(usize, &str)) -> Option<String> {
    for (idx, chunk) in source.split(b'\n').enumerate() {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(%phase, line = idx + 1, error = %e, "read failed, ending phase");
                return Some(e.to_string());
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let line = text.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        f(idx + 1, line);
    }
    None
}

fn log_report(report: &IngestReport) {
    for (phase, r) in [(Phase::Synonyms, &report.synonyms), (Phase::Campaigns, &report.campaigns), (Phase::Ads, &report.ads)] {
        tracing::info!(
            %phase,
            lines = r.lines,
            ingested = r.ingested,
            skipped = r.skipped,
            store_errors = r.store_errors,
            "phase complete"
        );
    }
}
