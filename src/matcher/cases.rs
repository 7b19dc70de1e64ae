use super::{CaseMatchDetail, CaseMatchReport};
use crate::error::Result;
use crate::normalize::AliasMap;
use crate::store::{BulletinStore, MatchKind, MonitoredCase, NewAlert};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashMap;

/// Match the entries ingested for one date against the monitored-case table.
///
/// The monitored-case and alias snapshots are fatal reads: matching cannot
/// proceed without them. Individual alert inserts are not; a store failure
/// on one candidate is logged and the pass continues.
pub async fn match_case_numbers(store: &BulletinStore, date: NaiveDate) -> Result<CaseMatchReport> {
    let monitored = store.list_monitored_cases().await?;
    let aliases = AliasMap::from_pairs(store.list_aliases().await?);
    let entries = store.entries_for_date(date).await?;

    let lookup = build_lookup(&monitored);
    debug!(
        "matching {} entries against {} monitored cases ({} distinct keys)",
        entries.len(),
        monitored.len(),
        lookup.len()
    );

    let mut report = CaseMatchReport {
        date,
        total_new_entries: entries.len() as u32,
        total_monitored_cases: monitored.len() as u32,
        matches_found: 0,
        alerts_created: 0,
        details: Vec::new(),
    };

    for entry in &entries {
        let canonical_court = aliases.resolve(&entry.court);
        let key = (entry.case_number.as_str(), canonical_court);
        let Some(watchers) = lookup.get(&key) else {
            continue;
        };

        for monitored_case in watchers {
            report.matches_found += 1;
            let created = match store
                .insert_alert(NewAlert {
                    user_id: monitored_case.user_id.clone(),
                    monitored_case_id: Some(monitored_case.id),
                    monitored_name_id: None,
                    entry_id: entry.id,
                    match_kind: MatchKind::CaseNumber,
                    matched_value: entry.case_number.clone(),
                    historical: false,
                })
                .await
            {
                Ok(created) => created,
                Err(e) => {
                    warn!(
                        "failed to insert alert for case {} / entry {}: {}",
                        monitored_case.case_number, entry.id, e
                    );
                    false
                }
            };
            if created {
                report.alerts_created += 1;
            }
            report.details.push(CaseMatchDetail {
                user_id: monitored_case.user_id.clone(),
                monitored_case_id: monitored_case.id,
                case_number: entry.case_number.clone(),
                court: canonical_court.to_string(),
                entry_id: entry.id,
                alert_created: created,
            });
        }
    }

    info!(
        "case matching for {}: {} matches, {} new alerts",
        date, report.matches_found, report.alerts_created
    );
    Ok(report)
}

/// One key may map to several rows: multiple users can watch the same case.
fn build_lookup(monitored: &[MonitoredCase]) -> HashMap<(&str, &str), Vec<&MonitoredCase>> {
    let mut lookup: HashMap<(&str, &str), Vec<&MonitoredCase>> = HashMap::new();
    for row in monitored {
        lookup
            .entry((row.case_number.as_str(), row.court.as_str()))
            .or_default()
            .push(row);
    }
    lookup
}
