use crate::transcripts::datetime_column;
use crate::AppState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const MAX_STATUS_CHECKS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub id: String,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

#[instrument(skip(state), err)]
pub async fn create_status_check(
    state: &AppState,
    client_name: &str,
) -> Result<StatusCheck> {
    let check = StatusCheck {
        id: uuid::Uuid::new_v4().to_string(),
        client_name: client_name.to_string(),
        timestamp: Utc::now(),
    };

    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO status_checks (id, client_name, created_at)
         VALUES (?, ?, ?)",
        params![
            check.id,
            check.client_name,
            check.timestamp.timestamp_millis()
        ],
    )?;

    // Report the stored precision so the response matches later reads
    Ok(StatusCheck {
        timestamp: DateTime::from_timestamp_millis(
            check.timestamp.timestamp_millis(),
        )
        .unwrap_or(check.timestamp),
        ..check
    })
}

/// Oldest first, capped at `MAX_STATUS_CHECKS`.
#[instrument(skip(state), err)]
pub async fn list_status_checks(state: &AppState) -> Result<Vec<StatusCheck>> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, client_name, created_at
         FROM status_checks
         ORDER BY created_at ASC, rowid ASC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(params![MAX_STATUS_CHECKS as i64], |row| {
        Ok(StatusCheck {
            id: row.get(0)?,
            client_name: row.get(1)?,
            timestamp: datetime_column(row, 2)?,
        })
    })?;
    let checks: Result<Vec<_>, _> = rows.collect();
    Ok(checks?)
}
