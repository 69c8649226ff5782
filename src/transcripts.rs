use crate::metadata::VideoMetadata;
use crate::summary::SummarySource;
use crate::AppState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTranscript {
    pub id: String,
    pub video_id: String,
    pub url: String,
    pub transcript: String,
    pub summary: String,
    pub summary_source: SummarySource,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub thumbnail_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by `upsert_transcript`.
#[derive(Debug, Clone)]
pub struct TranscriptWrite<'a> {
    pub video_id: &'a str,
    pub url: &'a str,
    pub transcript: &'a str,
    pub summary: &'a str,
    pub summary_source: SummarySource,
    pub metadata: &'a VideoMetadata,
}

const SELECT_COLUMNS: &str = "id, video_id, url, transcript, summary, \
    summary_source, title, channel, thumbnail_url, created_at, updated_at";

/// Read a Unix-millisecond column, rejecting values chrono cannot represent.
pub(crate) fn datetime_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn row_to_transcript(row: &Row<'_>) -> rusqlite::Result<StoredTranscript> {
    let source: String = row.get(5)?;
    Ok(StoredTranscript {
        id: row.get(0)?,
        video_id: row.get(1)?,
        url: row.get(2)?,
        transcript: row.get(3)?,
        summary: row.get(4)?,
        summary_source: SummarySource::parse(&source),
        title: row.get(6)?,
        channel: row.get(7)?,
        thumbnail_url: row.get(8)?,
        timestamp: datetime_column(row, 9)?,
        updated_at: datetime_column(row, 10)?,
    })
}

#[instrument(skip(state), err)]
pub async fn get_transcript_by_video_id(
    state: &AppState,
    video_id: &str,
) -> Result<Option<StoredTranscript>> {
    let conn = state.db.get()?;
    let transcript = conn
        .query_row(
            &format!(
                "SELECT {} FROM transcripts WHERE video_id = ?",
                SELECT_COLUMNS
            ),
            params![video_id],
            row_to_transcript,
        )
        .optional()?;
    Ok(transcript)
}

/// Insert or update the record for `write.video_id`.
///
/// On conflict the summary, its source, the URL and any metadata field that
/// carries a value are replaced. The stored transcript is kept unless it is
/// empty, and the original id and creation time never change.
#[instrument(skip(state, write), fields(video_id = write.video_id), err)]
pub async fn upsert_transcript(
    state: &AppState,
    write: &TranscriptWrite<'_>,
) -> Result<StoredTranscript> {
    info!("Saving transcript for video {}", write.video_id);
    let now = Utc::now().timestamp_millis();
    let id = uuid::Uuid::new_v4().to_string();

    {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO transcripts (
                id, video_id, url, transcript, summary, summary_source,
                title, channel, thumbnail_url, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT(video_id) DO UPDATE SET
                url = excluded.url,
                transcript = CASE
                    WHEN transcripts.transcript = '' THEN excluded.transcript
                    ELSE transcripts.transcript
                END,
                summary = excluded.summary,
                summary_source = excluded.summary_source,
                title = COALESCE(excluded.title, transcripts.title),
                channel = COALESCE(excluded.channel, transcripts.channel),
                thumbnail_url = COALESCE(
                    excluded.thumbnail_url, transcripts.thumbnail_url
                ),
                updated_at = excluded.updated_at",
            params![
                id,
                write.video_id,
                write.url,
                write.transcript,
                write.summary,
                write.summary_source.as_str(),
                write.metadata.title,
                write.metadata.channel,
                write.metadata.thumbnail_url,
                now,
            ],
        )?;
    }

    get_transcript_by_video_id(state, write.video_id)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!("Transcript {} missing after save", write.video_id)
        })
}

/// Most recently created records first.
#[instrument(skip(state), err)]
pub async fn list_recent_transcripts(
    state: &AppState,
    limit: usize,
) -> Result<Vec<StoredTranscript>> {
    let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transcripts
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?",
        SELECT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![limit as i64], row_to_transcript)?;
    let transcripts: Result<Vec<_>, _> = rows.collect();
    Ok(transcripts?)
}

#[instrument(skip(state), err)]
pub async fn delete_transcript(state: &AppState, video_id: &str) -> Result<bool> {
    let conn = state.db.get()?;
    let deleted = conn.execute(
        "DELETE FROM transcripts WHERE video_id = ?",
        params![video_id],
    )?;
    Ok(deleted > 0)
}

#[instrument(skip(state), err)]
pub async fn delete_all_transcripts(state: &AppState) -> Result<usize> {
    let conn = state.db.get()?;
    let deleted = conn.execute("DELETE FROM transcripts", [])?;
    info!("Cleared {} cached transcripts", deleted);
    Ok(deleted)
}

pub async fn count_transcripts(state: &AppState) -> Result<i64> {
    let conn = state.db.get()?;
    Ok(conn.query_row("SELECT COUNT(*) FROM transcripts", [], |row| {
        row.get(0)
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata(title: Option<&str>, channel: Option<&str>) -> VideoMetadata {
        VideoMetadata {
            title: title.map(str::to_string),
            channel: channel.map(str::to_string),
            thumbnail_url: None,
        }
    }

    fn write<'a>(
        video_id: &'a str,
        transcript: &'a str,
        summary: &'a str,
        metadata: &'a VideoMetadata,
    ) -> TranscriptWrite<'a> {
        TranscriptWrite {
            video_id,
            url: "https://youtu.be/x",
            transcript,
            summary,
            summary_source: SummarySource::Llm,
            metadata,
        }
    }

    #[tokio::test]
    async fn insert_then_fetch() {
        let state = AppState::new_for_testing();
        let meta = metadata(Some("Title"), Some("Channel"));

        let saved = upsert_transcript(
            &state,
            &write("dQw4w9WgXcQ", "the transcript", "the summary", &meta),
        )
        .await
        .unwrap();

        let fetched = get_transcript_by_video_id(&state, "dQw4w9WgXcQ")
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(fetched, saved);
        assert_eq!(fetched.title.as_deref(), Some("Title"));
        assert_eq!(fetched.summary_source, SummarySource::Llm);
        assert!(get_transcript_by_video_id(&state, "missing0000")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_summary_but_keeps_transcript() {
        let state = AppState::new_for_testing();
        let first_meta = metadata(Some("Old title"), Some("Channel"));
        let first = upsert_transcript(
            &state,
            &write("dQw4w9WgXcQ", "original transcript", "first", &first_meta),
        )
        .await
        .unwrap();

        let second_meta = metadata(Some("New title"), None);
        let mut second_write =
            write("dQw4w9WgXcQ", "different transcript", "second", &second_meta);
        second_write.summary_source = SummarySource::Fallback;
        let second = upsert_transcript(&state, &second_write).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(second.transcript, "original transcript");
        assert_eq!(second.summary, "second");
        assert_eq!(second.summary_source, SummarySource::Fallback);
        assert_eq!(second.title.as_deref(), Some("New title"));
        // Unknown metadata does not erase what was stored
        assert_eq!(second.channel.as_deref(), Some("Channel"));
        assert_eq!(count_transcripts(&state).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_transcript_is_filled_by_later_write() {
        let state = AppState::new_for_testing();
        let meta = VideoMetadata::default();
        upsert_transcript(&state, &write("abcdefghijk", "", "s", &meta))
            .await
            .unwrap();
        let saved = upsert_transcript(
            &state,
            &write("abcdefghijk", "now we have text", "s2", &meta),
        )
        .await
        .unwrap();
        assert_eq!(saved.transcript, "now we have text");
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let state = AppState::new_for_testing();
        let meta = VideoMetadata::default();
        for id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"] {
            upsert_transcript(&state, &write(id, "t", "s", &meta))
                .await
                .unwrap();
        }

        let recent = list_recent_transcripts(&state, 2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|t| t.video_id.as_str()).collect();
        assert_eq!(ids, vec!["ccccccccccc", "bbbbbbbbbbb"]);

        // Zero is clamped up to one
        assert_eq!(list_recent_transcripts(&state, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_one_and_all() {
        let state = AppState::new_for_testing();
        let meta = VideoMetadata::default();
        for id in ["aaaaaaaaaaa", "bbbbbbbbbbb"] {
            upsert_transcript(&state, &write(id, "t", "s", &meta))
                .await
                .unwrap();
        }

        assert!(delete_transcript(&state, "aaaaaaaaaaa").await.unwrap());
        assert!(!delete_transcript(&state, "aaaaaaaaaaa").await.unwrap());
        assert_eq!(delete_all_transcripts(&state).await.unwrap(), 1);
        assert_eq!(count_transcripts(&state).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn out_of_range_timestamp_is_an_error() {
        let state = AppState::new_for_testing();
        state
            .db
            .get()
            .unwrap()
            .execute(
                "INSERT INTO transcripts
                     (id, video_id, url, transcript, summary, summary_source,
                      created_at, updated_at)
                 VALUES ('bad', 'corrupt0000', 'u', 't', 's', 'llm', ?, 0)",
                params![i64::MAX],
            )
            .unwrap();

        assert!(get_transcript_by_video_id(&state, "corrupt0000")
            .await
            .is_err());
        assert!(list_recent_transcripts(&state, 10).await.is_err());
    }
}
