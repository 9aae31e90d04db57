use crate::errors::ApiError;
use chrono::{DateTime, Utc};
use ledger_core::events::LedgerEvent;
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

/// One row of the audit journal.
#[derive(Debug, Serialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub seq: u64,
    pub kind: String,
    pub event: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

pub async fn connect(db_url: &str) -> Result<Db, ApiError> {
    // Every connection to an in-memory database sees its own empty database.
    let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .map_err(|_| ApiError::Internal)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // NOTE: Append-only. Rows are never updated or deleted.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS ledger_events (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  id TEXT NOT NULL UNIQUE,
  kind TEXT NOT NULL,
  event_json TEXT NOT NULL,
  recorded_at TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    Ok(())
}

/// Append events in order, all or nothing.
pub async fn append_events(db: &Db, events: &[LedgerEvent]) -> Result<(), ApiError> {
    if events.is_empty() {
        return Ok(());
    }

    let recorded_at = Utc::now().to_rfc3339();
    let mut tx = db.begin().await.map_err(|_| ApiError::Internal)?;

    for event in events {
        let event_json = serde_json::to_string(event).map_err(|_| ApiError::Internal)?;

        sqlx::query(
            r#"INSERT INTO ledger_events (id, kind, event_json, recorded_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(event.kind())
        .bind(event_json)
        .bind(recorded_at.clone())
        .execute(&mut *tx)
        .await
        .map_err(|_| ApiError::Internal)?;
    }

    tx.commit().await.map_err(|_| ApiError::Internal)?;
    Ok(())
}

/// Highest ids a previous run handed out, read back from the journal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IssuedIds {
    pub data_point: u64,
    pub request: u64,
}

/// The ledger itself is in memory, so a restart would hand out ids 1, 2, ... again. Seeding from
/// the journal keeps a callback issued before the restart from landing on a new point.
pub async fn last_issued_ids(db: &Db) -> Result<IssuedIds, ApiError> {
    let row = sqlx::query(
        r#"SELECT
             COALESCE(MAX(CASE WHEN kind = 'data_point_added'
                          THEN CAST(json_extract(event_json, '$.id') AS INTEGER) END), 0) AS point,
             COALESCE(MAX(CASE WHEN kind IN ('analysis_requested', 'series_stats_requested')
                          THEN CAST(json_extract(event_json, '$.request_id') AS INTEGER) END), 0) AS request
           FROM ledger_events"#,
    )
    .fetch_one(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    let point: i64 = row.get("point");
    let request: i64 = row.get("request");
    Ok(IssuedIds {
        data_point: point as u64,
        request: request as u64,
    })
}

pub async fn count_events(db: &Db) -> Result<u64, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM ledger_events"#)
        .fetch_one(db)
        .await
        .map_err(|_| ApiError::Internal)?;
    let c: i64 = row.get("c");
    Ok(c as u64)
}

pub async fn list_events(db: &Db, offset: u64, limit: u64) -> Result<Vec<JournalEntry>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT seq, id, kind, event_json, recorded_at
           FROM ledger_events
           ORDER BY seq
           LIMIT ? OFFSET ?"#,
    )
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let seq: i64 = row.get(0);
        let id: String = row.get(1);
        let kind: String = row.get(2);
        let event_json: String = row.get(3);
        let recorded_at: String = row.get(4);

        out.push(JournalEntry {
            id: Uuid::parse_str(&id).map_err(|_| ApiError::Internal)?,
            seq: seq as u64,
            kind,
            event: serde_json::from_str(&event_json).map_err(|_| ApiError::Internal)?,
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                .map_err(|_| ApiError::Internal)?
                .with_timezone(&Utc),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::types::{DataPointId, RequestId};

    async fn memory_db() -> Db {
        let db = connect("sqlite::memory:").await.unwrap();
        init_schema(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn appends_and_lists_in_order() {
        let db = memory_db().await;
        let events = vec![
            LedgerEvent::DataPointAdded { id: DataPointId(1), stored_at: Utc::now() },
            LedgerEvent::AnalysisRequested { id: DataPointId(1), request_id: RequestId(1) },
            LedgerEvent::DataPointRevealed { id: DataPointId(1), series_id: "A".into() },
        ];
        append_events(&db, &events).await.unwrap();
        append_events(&db, &[]).await.unwrap();

        assert_eq!(count_events(&db).await.unwrap(), 3);

        let rows = list_events(&db, 1, 10).await.unwrap();
        let kinds: Vec<_> = rows.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, ["analysis_requested", "data_point_revealed"]);
        assert_eq!(rows[0].event["request_id"], 1);
        assert!(rows[0].seq < rows[1].seq);
    }

    #[tokio::test]
    async fn issued_ids_come_from_the_journal() {
        let db = memory_db().await;
        assert_eq!(last_issued_ids(&db).await.unwrap(), IssuedIds::default());

        let events = vec![
            LedgerEvent::DataPointAdded { id: DataPointId(3), stored_at: Utc::now() },
            LedgerEvent::AnalysisRequested { id: DataPointId(3), request_id: RequestId(4) },
            LedgerEvent::SeriesStatsRequested { series_id: "A".into(), request_id: RequestId(9) },
            LedgerEvent::DataPointRevealed { id: DataPointId(3), series_id: "A".into() },
        ];
        append_events(&db, &events).await.unwrap();

        assert_eq!(
            last_issued_ids(&db).await.unwrap(),
            IssuedIds { data_point: 3, request: 9 }
        );
    }
}
