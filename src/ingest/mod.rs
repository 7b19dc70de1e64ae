//! Per-date ingestion pipeline: locate, fetch, parse, normalize, store.
//!
//! Sources are processed strictly sequentially with a politeness delay
//! between requests. A failure on one source is recorded on its ingestion
//! attempt and never aborts the remaining sources.

use crate::error::Result;
use crate::fetch::{BulletinFetcher, FetchOutcome};
use crate::normalize::{normalize_case_number, AliasMap};
use crate::parser::parse_bulletin;
use crate::sources::{document_url, BulletinSource, SOURCES};
use crate::store::{BulletinStore, IngestionAttempt, NewBulletinEntry};
use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;

/// Outcome of ingesting one source for one date.
#[derive(Debug, Clone, Serialize)]
pub struct SourceIngestDetail {
    pub source_code: String,
    pub source_name: String,
    pub found: bool,
    /// Valid entries parsed from the document
    pub parsed_entries: u32,
    /// Entries newly inserted (duplicates from earlier runs excluded)
    pub inserted_entries: u32,
    /// Source skipped because a prior run already ingested it
    pub skipped: bool,
    pub error: Option<String>,
}

/// Aggregate result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub date: NaiveDate,
    pub total_sources: u32,
    pub successful: u32,
    pub failed: u32,
    pub total_entries: u32,
    pub sources: Vec<SourceIngestDetail>,
}

/// Ingest every known source for one date.
///
/// Idempotent: sources with a recorded successful attempt are skipped, and
/// entry insertion ignores duplicates, so a second run for the same date
/// inserts nothing new.
pub async fn ingest(
    store: &BulletinStore,
    fetcher: &BulletinFetcher,
    base_url: &str,
    date: NaiveDate,
    throttle: Duration,
) -> Result<IngestReport> {
    // Read-once alias snapshot for the whole run; failure here is fatal
    // because every stored entry depends on it.
    let aliases = AliasMap::from_pairs(store.list_aliases().await?);
    info!(
        "ingesting {} sources for {} ({} aliases)",
        SOURCES.len(),
        date,
        aliases.len()
    );

    let mut report = IngestReport {
        date,
        total_sources: SOURCES.len() as u32,
        successful: 0,
        failed: 0,
        total_entries: 0,
        sources: Vec::with_capacity(SOURCES.len()),
    };

    for (idx, source) in SOURCES.iter().enumerate() {
        if idx > 0 && !throttle.is_zero() {
            sleep(throttle).await;
        }

        let detail = ingest_source(store, fetcher, base_url, date, source, &aliases).await;
        if detail.error.is_none() {
            report.successful += 1;
        } else {
            report.failed += 1;
        }
        report.total_entries += detail.inserted_entries;
        report.sources.push(detail);
    }

    info!(
        "ingest {} finished: {}/{} sources ok, {} new entries",
        date, report.successful, report.total_sources, report.total_entries
    );
    Ok(report)
}

async fn ingest_source(
    store: &BulletinStore,
    fetcher: &BulletinFetcher,
    base_url: &str,
    date: NaiveDate,
    source: &BulletinSource,
    aliases: &AliasMap,
) -> SourceIngestDetail {
    let mut detail = SourceIngestDetail {
        source_code: source.code.to_string(),
        source_name: source.name.to_string(),
        found: false,
        parsed_entries: 0,
        inserted_entries: 0,
        skipped: false,
        error: None,
    };

    // Skip sources a prior run already ingested for this date.
    match store.get_attempt(date, source.code).await {
        Ok(Some(attempt)) if attempt.is_success() => {
            debug!("skipping {} for {}: already ingested", source.code, date);
            detail.found = true;
            detail.parsed_entries = attempt.entry_count;
            detail.skipped = true;
            return detail;
        }
        Ok(_) => {}
        Err(e) => {
            detail.error = Some(e.to_string());
            return detail;
        }
    }

    let url = document_url(base_url, source, date);
    let outcome = match fetcher.fetch_document(&url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("fetch failed for {}: {}", url, e);
            detail.error = Some(e.to_string());
            record_attempt(store, date, source, &detail).await;
            return detail;
        }
    };

    match outcome {
        FetchOutcome::NotPublished(reason) => {
            // Expected steady state for recent dates, not an error.
            debug!("{}", reason);
        }
        FetchOutcome::Found(text) => {
            detail.found = true;
            let entries = normalize_entries(parse_bulletin(&text), date, source, &url, aliases);
            detail.parsed_entries = entries.len() as u32;
            match store.insert_entries(entries).await {
                Ok(inserted) => detail.inserted_entries = inserted,
                Err(e) => detail.error = Some(e.to_string()),
            }
        }
    }

    record_attempt(store, date, source, &detail).await;
    detail
}

/// Canonicalize parsed entries and resolve court aliases. Entries whose case
/// number does not normalize are parser noise and are dropped silently.
fn normalize_entries(
    parsed: Vec<crate::parser::ParsedEntry>,
    date: NaiveDate,
    source: &BulletinSource,
    url: &str,
    aliases: &AliasMap,
) -> Vec<NewBulletinEntry> {
    parsed
        .into_iter()
        .filter_map(|entry| {
            let case_number = normalize_case_number(&entry.case_number)?;
            Some(NewBulletinEntry {
                publication_date: date,
                court: aliases.resolve(&entry.court).to_string(),
                case_number,
                detail: entry.detail,
                source_code: source.code.to_string(),
                document_url: url.to_string(),
            })
        })
        .collect()
}

async fn record_attempt(
    store: &BulletinStore,
    date: NaiveDate,
    source: &BulletinSource,
    detail: &SourceIngestDetail,
) {
    let attempt = IngestionAttempt {
        publication_date: date,
        source_code: source.code.to_string(),
        found: detail.found,
        entry_count: detail.parsed_entries,
        error: detail.error.clone(),
        attempted_at: Utc::now(),
    };
    if let Err(e) = store.record_attempt(attempt).await {
        warn!("failed to record attempt for {}: {}", source.code, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedEntry;

    #[test]
    fn test_normalize_entries_drops_invalid_numbers() {
        let source = crate::sources::source_by_code("bc").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let aliases = AliasMap::from_pairs([(
            "JDO 1".to_string(),
            "JUZGADO PRIMERO".to_string(),
        )]);

        let parsed = vec![
            ParsedEntry {
                court: "JDO 1".to_string(),
                case_number: "342/2025".to_string(),
                detail: "OK".to_string(),
            },
            ParsedEntry {
                court: "JDO 1".to_string(),
                case_number: "342/25".to_string(),
                detail: "BAD SHAPE".to_string(),
            },
        ];

        let entries = normalize_entries(parsed, date, source, "http://x/doc.htm", &aliases);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].case_number, "00342/2025");
        assert_eq!(entries[0].court, "JUZGADO PRIMERO");
    }
}
