//! Watch-list matching: exact case-number matches, search-mode-driven name
//! matches, and historical batch replay over the archive.

pub mod cases;
pub mod history;
pub mod names;

pub use cases::match_case_numbers;
pub use history::{match_historical_batch, BackfillCase, BackfillRange, ProgressEvent, ProgressPhase};
pub use names::{match_names, match_names_with, PatternExpander, StandardExpander};

use chrono::NaiveDate;
use serde::Serialize;

/// One case-number match, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CaseMatchDetail {
    pub user_id: String,
    pub monitored_case_id: i64,
    pub case_number: String,
    pub court: String,
    pub entry_id: i64,
    /// False when the alert already existed (deduplicated)
    pub alert_created: bool,
}

/// Result of one live case-number matching pass.
#[derive(Debug, Clone, Serialize)]
pub struct CaseMatchReport {
    pub date: NaiveDate,
    pub total_new_entries: u32,
    pub total_monitored_cases: u32,
    pub matches_found: u32,
    pub alerts_created: u32,
    pub details: Vec<CaseMatchDetail>,
}

/// One name match, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct NameMatchDetail {
    pub user_id: String,
    pub monitored_name_id: i64,
    pub full_name: String,
    /// The generated pattern that hit
    pub matched_pattern: String,
    pub entry_id: i64,
    pub alert_created: bool,
}

/// Result of one name matching pass.
#[derive(Debug, Clone, Serialize)]
pub struct NameMatchReport {
    pub date: NaiveDate,
    pub total_entries: u32,
    pub total_monitored_names: u32,
    pub matches_found: u32,
    pub alerts_created: u32,
    pub historical: bool,
    pub details: Vec<NameMatchDetail>,
}
