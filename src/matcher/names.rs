use super::{NameMatchDetail, NameMatchReport};
use crate::error::Result;
use crate::normalize::normalize_search_text;
use crate::store::{BulletinStore, MatchKind, MonitoredName, NewAlert, SearchMode};
use chrono::NaiveDate;
use log::{info, warn};

/// Collaborator that turns a monitored name into search patterns according
/// to its search mode.
pub trait PatternExpander: Send + Sync {
    fn expand(&self, full_name: &str, mode: SearchMode) -> Vec<String>;
}

/// Default pattern generation.
///
/// - `exact`: the literal name.
/// - `variations`: common given-name/surname order variations of the token
///   sequence.
/// - `fuzzy`: the full name plus every token long enough to be meaningful on
///   its own.
pub struct StandardExpander;

impl PatternExpander for StandardExpander {
    fn expand(&self, full_name: &str, mode: SearchMode) -> Vec<String> {
        let name = full_name.trim();
        match mode {
            SearchMode::Exact => vec![name.to_string()],
            SearchMode::Variations => order_variations(name),
            SearchMode::Fuzzy => fuzzy_patterns(name),
        }
    }
}

/// Minimum token length considered on its own in fuzzy mode; shorter tokens
/// (DE, LA, initials) match far too much.
const FUZZY_MIN_TOKEN_LEN: usize = 4;

fn order_variations(name: &str) -> Vec<String> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let mut patterns = vec![name.to_string()];

    // Surnames-first: the usual bulletin caption order when the watch-list
    // entry was written given-names-first.
    if tokens.len() >= 3 {
        let split = tokens.len() - 2;
        let mut reordered = tokens[split..].to_vec();
        reordered.extend_from_slice(&tokens[..split]);
        patterns.push(reordered.join(" "));
    }
    // First given name plus final surname.
    if tokens.len() >= 2 {
        patterns.push(format!("{} {}", tokens[0], tokens[tokens.len() - 1]));
    }

    patterns.dedup();
    patterns
}

fn fuzzy_patterns(name: &str) -> Vec<String> {
    let mut patterns = vec![name.to_string()];
    for token in name.split_whitespace() {
        if token.chars().count() >= FUZZY_MIN_TOKEN_LEN {
            patterns.push(token.to_string());
        }
    }
    patterns.dedup();
    patterns
}

/// Match one date's entries against the monitored-name table with the
/// default expander.
pub async fn match_names(
    store: &BulletinStore,
    date: NaiveDate,
    historical: bool,
) -> Result<NameMatchReport> {
    match_names_with(store, date, historical, &StandardExpander).await
}

/// Match one date's entries against the monitored-name table.
///
/// An entry matches a monitored name iff its normalized text contains the
/// normalized form of any generated pattern. The `historical` flag is
/// stamped onto every alert created in this pass so the dispatcher can
/// suppress live notification for backfilled matches.
pub async fn match_names_with(
    store: &BulletinStore,
    date: NaiveDate,
    historical: bool,
    expander: &dyn PatternExpander,
) -> Result<NameMatchReport> {
    let monitored = store.list_monitored_names().await?;
    let entries = store.entries_for_date(date).await?;

    let expanded: Vec<(&MonitoredName, Vec<String>)> = monitored
        .iter()
        .map(|name| {
            let patterns = expander
                .expand(&name.full_name, name.search_mode)
                .into_iter()
                .map(|p| normalize_search_text(&p))
                .filter(|p| !p.is_empty())
                .collect();
            (name, patterns)
        })
        .collect();

    let mut report = NameMatchReport {
        date,
        total_entries: entries.len() as u32,
        total_monitored_names: monitored.len() as u32,
        matches_found: 0,
        alerts_created: 0,
        historical,
        details: Vec::new(),
    };

    for entry in &entries {
        let text = normalize_search_text(&format!("{} {}", entry.court, entry.detail));
        for (name, patterns) in &expanded {
            let Some(hit) = patterns.iter().find(|p| text.contains(p.as_str())) else {
                continue;
            };

            report.matches_found += 1;
            let created = match store
                .insert_alert(NewAlert {
                    user_id: name.user_id.clone(),
                    monitored_case_id: None,
                    monitored_name_id: Some(name.id),
                    entry_id: entry.id,
                    match_kind: MatchKind::Name,
                    matched_value: hit.clone(),
                    historical,
                })
                .await
            {
                Ok(created) => created,
                Err(e) => {
                    warn!(
                        "failed to insert name alert for '{}' / entry {}: {}",
                        name.full_name, entry.id, e
                    );
                    false
                }
            };
            if created {
                report.alerts_created += 1;
            }
            report.details.push(NameMatchDetail {
                user_id: name.user_id.clone(),
                monitored_name_id: name.id,
                full_name: name.full_name.clone(),
                matched_pattern: hit.clone(),
                entry_id: entry.id,
                alert_created: created,
            });
        }
    }

    info!(
        "name matching for {} (historical={}): {} matches, {} new alerts",
        date, historical, report.matches_found, report.alerts_created
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewBulletinEntry;
    use tempfile::NamedTempFile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_exact_mode_single_pattern() {
        let patterns = StandardExpander.expand("MARIA PENA GUTIERREZ", SearchMode::Exact);
        assert_eq!(patterns, vec!["MARIA PENA GUTIERREZ"]);
    }

    #[test]
    fn test_variations_reorder_surnames() {
        let patterns = StandardExpander.expand("MARIA PENA GUTIERREZ", SearchMode::Variations);
        assert!(patterns.contains(&"MARIA PENA GUTIERREZ".to_string()));
        assert!(patterns.contains(&"PENA GUTIERREZ MARIA".to_string()));
        assert!(patterns.contains(&"MARIA GUTIERREZ".to_string()));
    }

    #[test]
    fn test_fuzzy_tokens_bounded_by_length() {
        let patterns = StandardExpander.expand("JOSE DE LA CRUZ", SearchMode::Fuzzy);
        assert!(patterns.contains(&"JOSE DE LA CRUZ".to_string()));
        assert!(patterns.contains(&"JOSE".to_string()));
        assert!(patterns.contains(&"CRUZ".to_string()));
        // short connectives never become patterns
        assert!(!patterns.contains(&"DE".to_string()));
        assert!(!patterns.contains(&"LA".to_string()));
    }

    async fn store_with_entry(detail: &str) -> (BulletinStore, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let store = BulletinStore::new(temp.path()).await.unwrap();
        store
            .insert_entries(vec![NewBulletinEntry {
                publication_date: date(2025, 3, 7),
                court: "JUZGADO PRIMERO".to_string(),
                case_number: "00342/2025".to_string(),
                detail: detail.to_string(),
                source_code: "bc".to_string(),
                document_url: "http://x/doc.htm".to_string(),
            }])
            .await
            .unwrap();
        (store, temp)
    }

    #[tokio::test]
    async fn test_exact_mode_matches_literal_only() {
        let (store, _f) = store_with_entry("MARÍA PEÑA GUTIÉRREZ VS PEDRO LUNA").await;
        store
            .add_monitored_name("user-1", "Maria Peña Gutierrez", SearchMode::Exact)
            .await
            .unwrap();
        store
            .add_monitored_name("user-1", "Gutierrez Maria", SearchMode::Exact)
            .await
            .unwrap();

        let report = match_names(&store, date(2025, 3, 7), false).await.unwrap();
        // only the literal (normalized) name is present in the entry text
        assert_eq!(report.matches_found, 1);
        assert_eq!(report.alerts_created, 1);
        assert_eq!(report.details[0].matched_pattern, "MARIA PENA GUTIERREZ");
    }

    #[tokio::test]
    async fn test_fuzzy_matches_superset_of_exact() {
        let (store, _f) = store_with_entry("PROMOVIDO POR GUTIÉRREZ LÓPEZ").await;
        store
            .add_monitored_name("user-1", "Maria Gutierrez", SearchMode::Exact)
            .await
            .unwrap();
        store
            .add_monitored_name("user-2", "Maria Gutierrez", SearchMode::Fuzzy)
            .await
            .unwrap();

        let report = match_names(&store, date(2025, 3, 7), false).await.unwrap();
        assert_eq!(report.matches_found, 1);
        assert_eq!(report.details[0].user_id, "user-2");
        assert_eq!(report.details[0].matched_pattern, "GUTIERREZ");
    }

    #[tokio::test]
    async fn test_historical_flag_stamped_and_duplicates_tolerated() {
        let (store, _f) = store_with_entry("JUAN RAMIREZ SOLTERO").await;
        store
            .add_monitored_name("user-1", "Juan Ramirez Soltero", SearchMode::Exact)
            .await
            .unwrap();

        let report = match_names(&store, date(2025, 3, 7), true).await.unwrap();
        assert_eq!(report.alerts_created, 1);

        // every alert from the pass carries the historical flag
        let alerts = store.alerts_for_user("user-1").await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].historical);
        assert!(store.notifiable_alerts().await.unwrap().is_empty());

        // re-running is a no-op, not an error
        let report = match_names(&store, date(2025, 3, 7), true).await.unwrap();
        assert_eq!(report.matches_found, 1);
        assert_eq!(report.alerts_created, 0);
    }
}
