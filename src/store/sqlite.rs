use super::{
    Alert, BulletinEntry, DeliveryChannel, IngestionAttempt, MatchKind, MonitoredCase,
    MonitoredName, NewAlert, NewBulletinEntry, SearchMode, PAGE_SIZE,
};
use crate::error::{Result, VigiaError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed store for entries, attempts, watch-lists and alerts.
///
/// Every operation opens its own connection inside a blocking task;
/// concurrent invocations are made safe purely by the unique indexes and
/// insert-or-ignore semantics, never by in-process locks.
#[derive(Debug, Clone)]
pub struct BulletinStore {
    db_path: PathBuf,
}

impl BulletinStore {
    /// Open (and if necessary create) the store at the given path.
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_buf = db_path.as_ref().to_path_buf();

        let init_path = db_path_buf.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = open(&init_path)?;
            initialize_schema(&conn)
        })
        .await
        .map_err(|e| VigiaError::Store(format!("Failed to spawn store initialization: {}", e)))??;

        Ok(Self {
            db_path: db_path_buf,
        })
    }

    /// Record one fetch attempt. Keyed on (date, source); the latest attempt
    /// replaces any previous one.
    pub async fn record_attempt(&self, attempt: IngestionAttempt) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO ingestion_attempts
                (publication_date, source_code, found, entry_count, error, attempted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    attempt.publication_date.format(DATE_FORMAT).to_string(),
                    attempt.source_code,
                    attempt.found,
                    attempt.entry_count,
                    attempt.error,
                    attempt.attempted_at.to_rfc3339(),
                ],
            )
            .map_err(|e| VigiaError::Store(format!("Failed to record attempt: {}", e)))?;
            Ok(())
        })
        .await
    }

    /// Get the recorded attempt for one (date, source), if any.
    pub async fn get_attempt(
        &self,
        date: NaiveDate,
        source_code: &str,
    ) -> Result<Option<IngestionAttempt>> {
        let source_code = source_code.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT publication_date, source_code, found, entry_count, error, attempted_at
                    FROM ingestion_attempts
                    WHERE publication_date = ?1 AND source_code = ?2
                    "#,
                )
                .map_err(|e| VigiaError::Store(format!("Failed to prepare attempt query: {}", e)))?;

            stmt.query_row(
                params![date.format(DATE_FORMAT).to_string(), source_code],
                attempt_from_row,
            )
            .optional()
            .map_err(|e| VigiaError::Store(format!("Failed to get attempt: {}", e)))
        })
        .await
    }

    /// Insert parsed entries, ignoring rows that already exist. Returns the
    /// number of rows actually inserted.
    pub async fn insert_entries(&self, entries: Vec<NewBulletinEntry>) -> Result<u32> {
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| VigiaError::Store(format!("Failed to begin transaction: {}", e)))?;
            let now = Utc::now().to_rfc3339();
            let mut inserted = 0u32;
            for entry in &entries {
                let changed = tx
                    .execute(
                        r#"
                        INSERT OR IGNORE INTO bulletin_entries
                        (publication_date, court, case_number, detail, source_code, document_url, created_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        "#,
                        params![
                            entry.publication_date.format(DATE_FORMAT).to_string(),
                            entry.court,
                            entry.case_number,
                            entry.detail,
                            entry.source_code,
                            entry.document_url,
                            now,
                        ],
                    )
                    .map_err(|e| VigiaError::Store(format!("Failed to insert entry: {}", e)))?;
                inserted += changed as u32;
            }
            tx.commit()
                .map_err(|e| VigiaError::Store(format!("Failed to commit entries: {}", e)))?;
            Ok(inserted)
        })
        .await
    }

    /// All entries for one publication date, paged until exhaustion.
    pub async fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<BulletinEntry>> {
        self.with_conn(move |conn| {
            paged_query(
                conn,
                r#"
                SELECT id, publication_date, court, case_number, detail, source_code,
                       document_url, created_at
                FROM bulletin_entries
                WHERE publication_date = ?1
                ORDER BY id
                LIMIT ?2 OFFSET ?3
                "#,
                &[&date.format(DATE_FORMAT).to_string()],
                entry_from_row,
            )
        })
        .await
    }

    /// All entries matching a (case number, court) pair on or after a lower
    /// bound. Used by the historical batch matcher.
    pub async fn entries_for_case_since(
        &self,
        case_number: &str,
        court: &str,
        since: NaiveDate,
    ) -> Result<Vec<BulletinEntry>> {
        let case_number = case_number.to_string();
        let court = court.to_string();
        self.with_conn(move |conn| {
            paged_query(
                conn,
                r#"
                SELECT id, publication_date, court, case_number, detail, source_code,
                       document_url, created_at
                FROM bulletin_entries
                WHERE case_number = ?1 AND court = ?2 AND publication_date >= ?3
                ORDER BY id
                LIMIT ?4 OFFSET ?5
                "#,
                &[&case_number, &court, &since.format(DATE_FORMAT).to_string()],
                entry_from_row,
            )
        })
        .await
    }

    /// Map a raw court-name spelling to a canonical name.
    pub async fn add_alias(&self, raw_name: &str, canonical_name: &str) -> Result<()> {
        let raw_name = raw_name.to_string();
        let canonical_name = canonical_name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO juzgado_aliases (raw_name, canonical_name) VALUES (?1, ?2)",
                params![raw_name, canonical_name],
            )
            .map_err(|e| VigiaError::Store(format!("Failed to add alias: {}", e)))?;
            Ok(())
        })
        .await
    }

    /// Full alias table, (raw, canonical) pairs.
    pub async fn list_aliases(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(move |conn| {
            paged_query(
                conn,
                "SELECT raw_name, canonical_name FROM juzgado_aliases ORDER BY raw_name LIMIT ?1 OFFSET ?2",
                &[],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        })
        .await
    }

    /// Add a monitored case for a user. The case number must normalize to
    /// canonical form; anything else is rejected.
    pub async fn add_monitored_case(
        &self,
        user_id: &str,
        case_number: &str,
        court: &str,
        label: Option<&str>,
    ) -> Result<i64> {
        let canonical = crate::normalize::normalize_case_number(case_number).ok_or_else(|| {
            VigiaError::InvalidInput(format!("Invalid case number: {}", case_number))
        })?;
        let user_id = user_id.to_string();
        let court = court.to_string();
        let label = label.map(str::to_string);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO monitored_cases (user_id, case_number, court, label) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, canonical, court, label],
            )
            .map_err(|e| VigiaError::Store(format!("Failed to add monitored case: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Remove a monitored case. Returns whether a row was deleted.
    pub async fn remove_monitored_case(&self, id: i64) -> Result<bool> {
        self.with_conn(move |conn| {
            let affected = conn
                .execute("DELETE FROM monitored_cases WHERE id = ?1", params![id])
                .map_err(|e| VigiaError::Store(format!("Failed to remove monitored case: {}", e)))?;
            Ok(affected > 0)
        })
        .await
    }

    /// The complete monitored-case table, paged until exhaustion.
    pub async fn list_monitored_cases(&self) -> Result<Vec<MonitoredCase>> {
        self.with_conn(move |conn| {
            paged_query(
                conn,
                "SELECT id, user_id, case_number, court, label FROM monitored_cases ORDER BY id LIMIT ?1 OFFSET ?2",
                &[],
                monitored_case_from_row,
            )
        })
        .await
    }

    /// Monitored cases belonging to one user.
    pub async fn monitored_cases_for_user(&self, user_id: &str) -> Result<Vec<MonitoredCase>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            paged_query(
                conn,
                "SELECT id, user_id, case_number, court, label FROM monitored_cases WHERE user_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
                &[&user_id],
                monitored_case_from_row,
            )
        })
        .await
    }

    /// Add a monitored name for a user.
    pub async fn add_monitored_name(
        &self,
        user_id: &str,
        full_name: &str,
        search_mode: SearchMode,
    ) -> Result<i64> {
        let user_id = user_id.to_string();
        let full_name = full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(VigiaError::InvalidInput(
                "Monitored name cannot be empty".to_string(),
            ));
        }
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO monitored_names (user_id, full_name, search_mode) VALUES (?1, ?2, ?3)",
                params![user_id, full_name, search_mode.as_str()],
            )
            .map_err(|e| VigiaError::Store(format!("Failed to add monitored name: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Remove a monitored name. Returns whether a row was deleted.
    pub async fn remove_monitored_name(&self, id: i64) -> Result<bool> {
        self.with_conn(move |conn| {
            let affected = conn
                .execute("DELETE FROM monitored_names WHERE id = ?1", params![id])
                .map_err(|e| VigiaError::Store(format!("Failed to remove monitored name: {}", e)))?;
            Ok(affected > 0)
        })
        .await
    }

    /// The complete monitored-name table, paged until exhaustion.
    pub async fn list_monitored_names(&self) -> Result<Vec<MonitoredName>> {
        self.with_conn(move |conn| {
            paged_query(
                conn,
                "SELECT id, user_id, full_name, search_mode FROM monitored_names ORDER BY id LIMIT ?1 OFFSET ?2",
                &[],
                monitored_name_from_row,
            )
        })
        .await
    }

    /// Insert an alert with conflict-ignoring semantics on the
    /// (user, entry, watch-list row) uniqueness invariant. Returns whether a
    /// row was actually inserted; a suppressed duplicate is `false`, never an
    /// error.
    pub async fn insert_alert(&self, alert: NewAlert) -> Result<bool> {
        if alert.monitored_case_id.is_some() == alert.monitored_name_id.is_some() {
            return Err(VigiaError::InvalidInput(
                "Alert must reference exactly one of monitored case or monitored name".to_string(),
            ));
        }
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    r#"
                    INSERT OR IGNORE INTO alerts
                    (user_id, monitored_case_id, monitored_name_id, entry_id, match_kind,
                     matched_value, historical, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    params![
                        alert.user_id,
                        alert.monitored_case_id,
                        alert.monitored_name_id,
                        alert.entry_id,
                        alert.match_kind.as_str(),
                        alert.matched_value,
                        alert.historical,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(|e| VigiaError::Store(format!("Failed to insert alert: {}", e)))?;
            Ok(changed > 0)
        })
        .await
    }

    /// Alerts eligible for live notification: undelivered, not historical,
    /// and excluding fuzzy-mode name matches, which exist in the store but
    /// never reach live dispatch.
    pub async fn notifiable_alerts(&self) -> Result<Vec<Alert>> {
        self.with_conn(move |conn| {
            paged_query(
                conn,
                r#"
                SELECT a.id, a.user_id, a.monitored_case_id, a.monitored_name_id, a.entry_id,
                       a.match_kind, a.matched_value, a.historical, a.email_sent, a.chat_sent,
                       a.delivery_error, a.delivered_at, a.created_at
                FROM alerts a
                LEFT JOIN monitored_names n ON n.id = a.monitored_name_id
                WHERE a.historical = 0
                  AND a.email_sent = 0
                  AND a.chat_sent = 0
                  AND (a.monitored_name_id IS NULL OR COALESCE(n.search_mode, '') != 'fuzzy')
                ORDER BY a.id
                LIMIT ?1 OFFSET ?2
                "#,
                &[],
                alert_from_row,
            )
        })
        .await
    }

    /// All alerts belonging to one user, newest first.
    pub async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<Alert>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            paged_query(
                conn,
                r#"
                SELECT id, user_id, monitored_case_id, monitored_name_id, entry_id,
                       match_kind, matched_value, historical, email_sent, chat_sent,
                       delivery_error, delivered_at, created_at
                FROM alerts
                WHERE user_id = ?1
                ORDER BY id DESC
                LIMIT ?2 OFFSET ?3
                "#,
                &[&user_id],
                alert_from_row,
            )
        })
        .await
    }

    /// Record a delivery outcome on an alert. Called by the notification
    /// dispatcher, never by the matchers.
    pub async fn mark_alert_delivered(
        &self,
        alert_id: i64,
        channel: DeliveryChannel,
        error: Option<String>,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            let column = match channel {
                DeliveryChannel::Email => "email_sent",
                DeliveryChannel::Chat => "chat_sent",
            };
            let sent = error.is_none();
            let sql = format!(
                "UPDATE alerts SET {} = ?1, delivery_error = ?2, delivered_at = ?3 WHERE id = ?4",
                column
            );
            conn.execute(
                &sql,
                params![sent, error, Utc::now().to_rfc3339(), alert_id],
            )
            .map_err(|e| VigiaError::Store(format!("Failed to mark alert delivered: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut conn = open(&db_path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| VigiaError::Store(format!("Failed to spawn store operation: {}", e)))?
    }
}

fn open(db_path: &Path) -> Result<Connection> {
    Connection::open(db_path)
        .map_err(|e| VigiaError::Store(format!("Failed to open store database: {}", e)))
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS bulletin_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            publication_date TEXT NOT NULL,
            court TEXT NOT NULL,
            case_number TEXT NOT NULL,
            detail TEXT NOT NULL,
            source_code TEXT NOT NULL,
            document_url TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(publication_date, court, case_number)
        );
        CREATE INDEX IF NOT EXISTS idx_entries_case ON bulletin_entries(case_number, court);
        CREATE INDEX IF NOT EXISTS idx_entries_date ON bulletin_entries(publication_date);

        CREATE TABLE IF NOT EXISTS ingestion_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            publication_date TEXT NOT NULL,
            source_code TEXT NOT NULL,
            found INTEGER NOT NULL,
            entry_count INTEGER NOT NULL,
            error TEXT,
            attempted_at TEXT NOT NULL,
            UNIQUE(publication_date, source_code)
        );

        CREATE TABLE IF NOT EXISTS juzgado_aliases (
            raw_name TEXT PRIMARY KEY,
            canonical_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS monitored_cases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            case_number TEXT NOT NULL,
            court TEXT NOT NULL,
            label TEXT
        );

        CREATE TABLE IF NOT EXISTS monitored_names (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            search_mode TEXT NOT NULL CHECK (search_mode IN ('exact', 'variations', 'fuzzy'))
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            monitored_case_id INTEGER,
            monitored_name_id INTEGER,
            entry_id INTEGER NOT NULL,
            match_kind TEXT NOT NULL,
            matched_value TEXT NOT NULL,
            historical INTEGER NOT NULL DEFAULT 0,
            email_sent INTEGER NOT NULL DEFAULT 0,
            chat_sent INTEGER NOT NULL DEFAULT 0,
            delivery_error TEXT,
            delivered_at TEXT,
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_case_dedup
            ON alerts(user_id, entry_id, monitored_case_id)
            WHERE monitored_case_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_name_dedup
            ON alerts(user_id, entry_id, monitored_name_id)
            WHERE monitored_name_id IS NOT NULL;
        "#,
    )
    .map_err(|e| VigiaError::Store(format!("Failed to initialize store schema: {}", e)))
}

/// Run a LIMIT/OFFSET query repeatedly until a short page signals
/// exhaustion. The page parameters are appended after `extra_params`.
fn paged_query<T, F>(
    conn: &Connection,
    sql: &str,
    extra_params: &[&dyn rusqlite::ToSql],
    mut map_row: F,
) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut results = Vec::new();
    let mut offset: i64 = 0;

    loop {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| VigiaError::Store(format!("Failed to prepare paged query: {}", e)))?;

        let limit = PAGE_SIZE as i64;
        let mut bound: Vec<&dyn rusqlite::ToSql> = extra_params.to_vec();
        bound.push(&limit);
        bound.push(&offset);

        let rows = stmt
            .query_map(&bound[..], &mut map_row)
            .map_err(|e| VigiaError::Store(format!("Failed to execute paged query: {}", e)))?;

        let mut page_len = 0usize;
        for row in rows {
            results.push(
                row.map_err(|e| VigiaError::Store(format!("Failed to read row: {}", e)))?,
            );
            page_len += 1;
        }

        if page_len < PAGE_SIZE as usize {
            break;
        }
        offset += PAGE_SIZE as i64;
    }

    Ok(results)
}

fn parse_stored_date(idx: usize, value: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, "date".to_string(), rusqlite::types::Type::Text)
    })
}

fn parse_stored_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                idx,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<BulletinEntry> {
    Ok(BulletinEntry {
        id: row.get(0)?,
        publication_date: parse_stored_date(1, row.get::<_, String>(1)?)?,
        court: row.get(2)?,
        case_number: row.get(3)?,
        detail: row.get(4)?,
        source_code: row.get(5)?,
        document_url: row.get(6)?,
        created_at: parse_stored_timestamp(7, row.get::<_, String>(7)?)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<IngestionAttempt> {
    Ok(IngestionAttempt {
        publication_date: parse_stored_date(0, row.get::<_, String>(0)?)?,
        source_code: row.get(1)?,
        found: row.get(2)?,
        entry_count: row.get(3)?,
        error: row.get(4)?,
        attempted_at: parse_stored_timestamp(5, row.get::<_, String>(5)?)?,
    })
}

fn monitored_case_from_row(row: &Row<'_>) -> rusqlite::Result<MonitoredCase> {
    Ok(MonitoredCase {
        id: row.get(0)?,
        user_id: row.get(1)?,
        case_number: row.get(2)?,
        court: row.get(3)?,
        label: row.get(4)?,
    })
}

fn monitored_name_from_row(row: &Row<'_>) -> rusqlite::Result<MonitoredName> {
    let mode: String = row.get(3)?;
    let search_mode = SearchMode::from_str(&mode).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(
            3,
            "search_mode".to_string(),
            rusqlite::types::Type::Text,
        )
    })?;
    Ok(MonitoredName {
        id: row.get(0)?,
        user_id: row.get(1)?,
        full_name: row.get(2)?,
        search_mode,
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let kind: String = row.get(5)?;
    let match_kind = MatchKind::from_str(&kind).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(5, "match_kind".to_string(), rusqlite::types::Type::Text)
    })?;
    let delivered_at: Option<String> = row.get(11)?;
    Ok(Alert {
        id: row.get(0)?,
        user_id: row.get(1)?,
        monitored_case_id: row.get(2)?,
        monitored_name_id: row.get(3)?,
        entry_id: row.get(4)?,
        match_kind,
        matched_value: row.get(6)?,
        historical: row.get(7)?,
        email_sent: row.get(8)?,
        chat_sent: row.get(9)?,
        delivery_error: row.get(10)?,
        delivered_at: delivered_at
            .map(|v| parse_stored_timestamp(11, v))
            .transpose()?,
        created_at: parse_stored_timestamp(12, row.get::<_, String>(12)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    async fn create_test_store() -> (BulletinStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = BulletinStore::new(temp_file.path()).await.unwrap();
        (store, temp_file)
    }

    fn test_entry(date: NaiveDate, court: &str, case_number: &str) -> NewBulletinEntry {
        NewBulletinEntry {
            publication_date: date,
            court: court.to_string(),
            case_number: case_number.to_string(),
            detail: "SE TIENE POR PRESENTADO".to_string(),
            source_code: "bc".to_string(),
            document_url: "http://example.org/doc.htm".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_entry_insert_is_idempotent() {
        let (store, _f) = create_test_store().await;
        let d = date(2025, 3, 7);

        let first = store
            .insert_entries(vec![
                test_entry(d, "JUZGADO PRIMERO", "00342/2025"),
                test_entry(d, "JUZGADO PRIMERO", "00007/2024"),
            ])
            .await
            .unwrap();
        assert_eq!(first, 2);

        let second = store
            .insert_entries(vec![test_entry(d, "JUZGADO PRIMERO", "00342/2025")])
            .await
            .unwrap();
        assert_eq!(second, 0);

        let entries = store.entries_for_date(d).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_attempt_replace_and_lookup() {
        let (store, _f) = create_test_store().await;
        let d = date(2025, 3, 7);

        store
            .record_attempt(IngestionAttempt {
                publication_date: d,
                source_code: "bc".to_string(),
                found: false,
                entry_count: 0,
                error: Some("timeout".to_string()),
                attempted_at: Utc::now(),
            })
            .await
            .unwrap();

        let attempt = store.get_attempt(d, "bc").await.unwrap().unwrap();
        assert!(!attempt.is_success());

        store
            .record_attempt(IngestionAttempt {
                publication_date: d,
                source_code: "bc".to_string(),
                found: true,
                entry_count: 12,
                error: None,
                attempted_at: Utc::now(),
            })
            .await
            .unwrap();

        let attempt = store.get_attempt(d, "bc").await.unwrap().unwrap();
        assert!(attempt.is_success());
        assert_eq!(attempt.entry_count, 12);
        assert!(store.get_attempt(d, "bs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paged_reads_cross_page_boundary() {
        let (store, _f) = create_test_store().await;
        let d = date(2025, 3, 7);

        let entries: Vec<_> = (0..(PAGE_SIZE + 17))
            .map(|i| test_entry(d, "JUZGADO PRIMERO", &format!("{:05}/2025", i + 1)))
            .collect();
        let inserted = store.insert_entries(entries).await.unwrap();
        assert_eq!(inserted, PAGE_SIZE + 17);

        let read = store.entries_for_date(d).await.unwrap();
        assert_eq!(read.len(), (PAGE_SIZE + 17) as usize);
    }

    #[tokio::test]
    async fn test_monitored_case_rejects_invalid_number() {
        let (store, _f) = create_test_store().await;
        let result = store
            .add_monitored_case("user-1", "342/25", "JUZGADO PRIMERO", None)
            .await;
        assert!(matches!(result, Err(VigiaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_monitored_case_stores_canonical_form() {
        let (store, _f) = create_test_store().await;
        store
            .add_monitored_case("user-1", "342/2025", "JUZGADO PRIMERO", Some("cliente"))
            .await
            .unwrap();
        let cases = store.list_monitored_cases().await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_number, "00342/2025");
        assert_eq!(cases[0].label.as_deref(), Some("cliente"));
    }

    #[tokio::test]
    async fn test_alert_dedup_and_historical_isolation() {
        let (store, _f) = create_test_store().await;
        let d = date(2025, 3, 7);
        store
            .insert_entries(vec![test_entry(d, "JUZGADO PRIMERO", "00342/2025")])
            .await
            .unwrap();
        let entry_id = store.entries_for_date(d).await.unwrap()[0].id;
        let case_id = store
            .add_monitored_case("user-1", "342/2025", "JUZGADO PRIMERO", None)
            .await
            .unwrap();

        // historical alert lands first
        let inserted = store
            .insert_alert(NewAlert {
                user_id: "user-1".to_string(),
                monitored_case_id: Some(case_id),
                monitored_name_id: None,
                entry_id,
                match_kind: MatchKind::CaseNumber,
                matched_value: "00342/2025".to_string(),
                historical: true,
            })
            .await
            .unwrap();
        assert!(inserted);

        // live match for the same triple is deduplicated, not an error
        let inserted = store
            .insert_alert(NewAlert {
                user_id: "user-1".to_string(),
                monitored_case_id: Some(case_id),
                monitored_name_id: None,
                entry_id,
                match_kind: MatchKind::CaseNumber,
                matched_value: "00342/2025".to_string(),
                historical: false,
            })
            .await
            .unwrap();
        assert!(!inserted);

        // the surviving alert is historical, so nothing is notifiable
        let notifiable = store.notifiable_alerts().await.unwrap();
        assert!(notifiable.is_empty());
    }

    #[tokio::test]
    async fn test_notifiable_excludes_fuzzy_and_delivered() {
        let (store, _f) = create_test_store().await;
        let d = date(2025, 3, 7);
        store
            .insert_entries(vec![
                test_entry(d, "JUZGADO PRIMERO", "00001/2025"),
                test_entry(d, "JUZGADO PRIMERO", "00002/2025"),
            ])
            .await
            .unwrap();
        let entries = store.entries_for_date(d).await.unwrap();

        let exact_id = store
            .add_monitored_name("user-1", "MARIA PENA", SearchMode::Exact)
            .await
            .unwrap();
        let fuzzy_id = store
            .add_monitored_name("user-1", "JOSE NUNEZ", SearchMode::Fuzzy)
            .await
            .unwrap();

        for (name_id, entry) in [(exact_id, &entries[0]), (fuzzy_id, &entries[1])] {
            store
                .insert_alert(NewAlert {
                    user_id: "user-1".to_string(),
                    monitored_case_id: None,
                    monitored_name_id: Some(name_id),
                    entry_id: entry.id,
                    match_kind: MatchKind::Name,
                    matched_value: "X".to_string(),
                    historical: false,
                })
                .await
                .unwrap();
        }

        let notifiable = store.notifiable_alerts().await.unwrap();
        assert_eq!(notifiable.len(), 1);
        assert_eq!(notifiable[0].monitored_name_id, Some(exact_id));

        store
            .mark_alert_delivered(notifiable[0].id, DeliveryChannel::Email, None)
            .await
            .unwrap();
        assert!(store.notifiable_alerts().await.unwrap().is_empty());

        // both alerts still exist for the user
        assert_eq!(store.alerts_for_user("user-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_alert_requires_exactly_one_reference() {
        let (store, _f) = create_test_store().await;
        let result = store
            .insert_alert(NewAlert {
                user_id: "user-1".to_string(),
                monitored_case_id: None,
                monitored_name_id: None,
                entry_id: 1,
                match_kind: MatchKind::CaseNumber,
                matched_value: "X".to_string(),
                historical: false,
            })
            .await;
        assert!(matches!(result, Err(VigiaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_entries_for_case_since_bound() {
        let (store, _f) = create_test_store().await;
        store
            .insert_entries(vec![
                test_entry(date(2020, 1, 10), "JUZGADO PRIMERO", "00342/2019"),
                test_entry(date(2024, 6, 1), "JUZGADO PRIMERO", "00342/2019"),
                test_entry(date(2024, 6, 1), "JUZGADO SEGUNDO", "00342/2019"),
            ])
            .await
            .unwrap();

        let rows = store
            .entries_for_case_since("00342/2019", "JUZGADO PRIMERO", date(2021, 1, 1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].publication_date, date(2024, 6, 1));
    }
}
