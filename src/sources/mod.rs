use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// A named bulletin publication channel. Immutable, defined at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulletinSource {
    /// Short code embedded in the document file name
    pub code: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Geographic scope of the publication
    pub region: &'static str,
}

/// The bulletin sources the engine knows how to retrieve.
///
/// Order matters: ingestion walks this list sequentially with a politeness
/// delay between requests.
pub const SOURCES: &[BulletinSource] = &[
    BulletinSource {
        code: "bc",
        name: "Boletín Judicial Centro",
        region: "Querétaro",
    },
    BulletinSource {
        code: "bs",
        name: "Boletín Judicial San Juan del Río",
        region: "San Juan del Río",
    },
    BulletinSource {
        code: "bq",
        name: "Boletín Judicial Cadereyta",
        region: "Cadereyta",
    },
    BulletinSource {
        code: "ba",
        name: "Boletín Judicial Amealco",
        region: "Amealco",
    },
];

/// Look up a source by its code.
pub fn source_by_code(code: &str) -> Option<&'static BulletinSource> {
    SOURCES.iter().find(|s| s.code == code)
}

/// Build the retrieval address for one source on one date.
///
/// The archive uses a fixed naming convention: the four-digit year as a
/// directory, then `boletines/`, then the source code followed by the
/// two-digit year and zero-padded month and day, with an `.htm` extension.
pub fn document_url(base_url: &str, source: &BulletinSource, date: NaiveDate) -> String {
    format!(
        "{}/{}/boletines/{}{:02}{:02}{:02}.htm",
        base_url.trim_end_matches('/'),
        date.year(),
        source.code,
        date.year() % 100,
        date.month(),
        date.day()
    )
}
