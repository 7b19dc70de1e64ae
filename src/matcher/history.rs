use crate::error::Result;
use crate::store::{BulletinStore, MatchKind, NewAlert};
use chrono::{Duration, NaiveDate, Utc};
use log::{info, warn};
use serde::Serialize;

/// First date the bulletin archive covers.
pub const ARCHIVE_START: NaiveDate = match NaiveDate::from_ymd_opt(2005, 1, 1) {
    Some(d) => d,
    None => panic!("invalid archive start date"),
};

/// How far back a historical replay scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillRange {
    /// The full archive
    All,
    /// The last ninety days
    Last90Days,
}

impl BackfillRange {
    pub fn lower_bound(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::All => ARCHIVE_START,
            Self::Last90Days => today - Duration::days(90),
        }
    }
}

/// One newly-monitored case to replay against the archive.
#[derive(Debug, Clone)]
pub struct BackfillCase {
    pub user_id: String,
    pub monitored_case_id: i64,
    pub case_number: String,
    pub court: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Searching,
    CreatingAlerts,
}

/// Progress report, delivered synchronously in tuple order, twice per case:
/// once entering the search, once after alert creation.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub case_index: usize,
    pub total_cases: usize,
    pub case_number: String,
    pub court: String,
    pub matches_found: u32,
    pub alerts_created: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillCaseDetail {
    pub case_number: String,
    pub court: String,
    pub matches_found: u32,
    pub alerts_created: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub total_cases: u32,
    pub total_matches_found: u32,
    pub total_alerts_created: u32,
    pub details: Vec<BackfillCaseDetail>,
}

/// Replay matching for newly-monitored cases against the archive.
///
/// Processing is deliberately sequential: callers stream progress to an end
/// user in real time and need monotonically increasing, per-tuple progress.
/// A store failure on one tuple is recorded as zero matches for that tuple
/// and the batch continues; it never aborts early. Every alert created here
/// is flagged historical so live dispatch ignores it.
pub async fn match_historical_batch<F>(
    store: &BulletinStore,
    cases: Vec<BackfillCase>,
    range: BackfillRange,
    mut on_progress: F,
) -> Result<BackfillReport>
where
    F: FnMut(ProgressEvent),
{
    let lower_bound = range.lower_bound(Utc::now().date_naive());
    let total_cases = cases.len();
    info!(
        "historical backfill: {} cases, scanning from {}",
        total_cases, lower_bound
    );

    let mut report = BackfillReport {
        total_cases: total_cases as u32,
        total_matches_found: 0,
        total_alerts_created: 0,
        details: Vec::with_capacity(total_cases),
    };

    for (case_index, case) in cases.into_iter().enumerate() {
        on_progress(ProgressEvent {
            phase: ProgressPhase::Searching,
            case_index,
            total_cases,
            case_number: case.case_number.clone(),
            court: case.court.clone(),
            matches_found: 0,
            alerts_created: 0,
        });

        let detail = match replay_case(store, &case, lower_bound).await {
            Ok((matches_found, alerts_created)) => BackfillCaseDetail {
                case_number: case.case_number.clone(),
                court: case.court.clone(),
                matches_found,
                alerts_created,
                error: None,
            },
            Err(e) => {
                warn!(
                    "backfill failed for case {} ({}): {}",
                    case.case_number, case.court, e
                );
                BackfillCaseDetail {
                    case_number: case.case_number.clone(),
                    court: case.court.clone(),
                    matches_found: 0,
                    alerts_created: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        report.total_matches_found += detail.matches_found;
        report.total_alerts_created += detail.alerts_created;

        on_progress(ProgressEvent {
            phase: ProgressPhase::CreatingAlerts,
            case_index,
            total_cases,
            case_number: case.case_number.clone(),
            court: case.court.clone(),
            matches_found: detail.matches_found,
            alerts_created: detail.alerts_created,
        });

        report.details.push(detail);
    }

    info!(
        "historical backfill finished: {} matches, {} new alerts",
        report.total_matches_found, report.total_alerts_created
    );
    Ok(report)
}

async fn replay_case(
    store: &BulletinStore,
    case: &BackfillCase,
    lower_bound: NaiveDate,
) -> Result<(u32, u32)> {
    let entries = store
        .entries_for_case_since(&case.case_number, &case.court, lower_bound)
        .await?;

    let matches_found = entries.len() as u32;
    let mut alerts_created = 0u32;
    for entry in entries {
        let created = store
            .insert_alert(NewAlert {
                user_id: case.user_id.clone(),
                monitored_case_id: Some(case.monitored_case_id),
                monitored_name_id: None,
                entry_id: entry.id,
                match_kind: MatchKind::CaseNumber,
                matched_value: entry.case_number.clone(),
                historical: true,
            })
            .await?;
        if created {
            alerts_created += 1;
        }
    }
    Ok((matches_found, alerts_created))
}
