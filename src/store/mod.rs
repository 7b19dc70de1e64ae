pub mod sqlite;

pub use sqlite::BulletinStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The backing store truncates unbounded reads; readers loop through pages
/// of this size until a short page signals exhaustion.
pub const PAGE_SIZE: u32 = 500;

/// One parsed case mention as persisted. (date, court, case number) is
/// unique; re-ingestion is an insert-or-ignore no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinEntry {
    pub id: i64,
    pub publication_date: NaiveDate,
    pub court: String,
    pub case_number: String,
    pub detail: String,
    pub source_code: String,
    pub document_url: String,
    pub created_at: DateTime<Utc>,
}

/// An entry pending insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBulletinEntry {
    pub publication_date: NaiveDate,
    pub court: String,
    pub case_number: String,
    pub detail: String,
    pub source_code: String,
    pub document_url: String,
}

/// One fetch attempt per (date, source). The latest attempt wins; a stored
/// success lets re-runs skip the source cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionAttempt {
    pub publication_date: NaiveDate,
    pub source_code: String,
    pub found: bool,
    pub entry_count: u32,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl IngestionAttempt {
    /// Whether this attempt found and ingested a bulletin, letting re-runs
    /// skip the source. A not-yet-published outcome is retried on the next
    /// run, since the bulletin may appear later in the day.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.found
    }
}

/// A user's watched (case number, court) pair. Case numbers are stored in
/// canonical `NNNNN/YYYY` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredCase {
    pub id: i64,
    pub user_id: String,
    pub case_number: String,
    pub court: String,
    pub label: Option<String>,
}

/// Pattern-expansion mode for a monitored name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Exact,
    Variations,
    Fuzzy,
}

impl SearchMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "variations" => Some(Self::Variations),
            "fuzzy" => Some(Self::Fuzzy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Variations => "variations",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// A user's watched full name plus its search mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredName {
    pub id: i64,
    pub user_id: String,
    pub full_name: String,
    pub search_mode: SearchMode,
}

/// What kind of watch-list entry produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    CaseNumber,
    Name,
}

impl MatchKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "case_number" => Some(Self::CaseNumber),
            "name" => Some(Self::Name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseNumber => "case_number",
            Self::Name => "name",
        }
    }
}

/// A match artifact. Created once by the matchers, mutated only by the
/// notification dispatcher to record delivery outcome, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub user_id: String,
    pub monitored_case_id: Option<i64>,
    pub monitored_name_id: Option<i64>,
    pub entry_id: i64,
    pub match_kind: MatchKind,
    pub matched_value: String,
    pub historical: bool,
    pub email_sent: bool,
    pub chat_sent: bool,
    pub delivery_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An alert pending insertion. Exactly one of `monitored_case_id` /
/// `monitored_name_id` must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub user_id: String,
    pub monitored_case_id: Option<i64>,
    pub monitored_name_id: Option<i64>,
    pub entry_id: i64,
    pub match_kind: MatchKind,
    pub matched_value: String,
    pub historical: bool,
}

/// Delivery channel recorded on an alert by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Email,
    Chat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_round_trip() {
        for mode in [SearchMode::Exact, SearchMode::Variations, SearchMode::Fuzzy] {
            assert_eq!(SearchMode::from_str(mode.as_str()), Some(mode));
        }
        assert_eq!(SearchMode::from_str("EXACT"), Some(SearchMode::Exact));
        assert_eq!(SearchMode::from_str("nope"), None);
    }

    #[test]
    fn test_match_kind_round_trip() {
        assert_eq!(MatchKind::from_str("case_number"), Some(MatchKind::CaseNumber));
        assert_eq!(MatchKind::from_str("name"), Some(MatchKind::Name));
        assert_eq!(MatchKind::from_str("other"), None);
    }
}
