use crate::channel::ChannelClient;
use crate::metadata::MetadataClient;
use crate::openai::{real::maybe_create_openai_client, OpenAIClientTrait};
use crate::searchapi::SearchApiClient;
use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub mod app;
pub mod channel;
pub mod cli;
pub mod error;
pub mod fallback;
pub mod metadata;
pub mod openai;
pub mod prompts;
pub mod searchapi;
pub mod status;
pub mod summary;
pub mod transcription;
pub mod transcripts;
pub mod video_id;

pub mod test_utils;

pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

// Counters reported by /api/stats
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub summarize_requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub llm_summaries: AtomicU64,
    pub fallback_summaries: AtomicU64,
    pub error_count: AtomicU64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub summarize_requests: u64,
    pub cache_hits: u64,
    pub llm_summaries: u64,
    pub fallback_summaries: u64,
    pub error_count: u64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            summarize_requests: self.summarize_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            llm_summaries: self.llm_summaries.load(Ordering::Relaxed),
            fallback_summaries: self.fallback_summaries.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}

pub struct AppState {
    pub db: Pool<SqliteConnectionManager>,
    pub openai_client: Option<Arc<dyn OpenAIClientTrait>>,
    pub summary_model: String,
    pub searchapi: SearchApiClient,
    pub metadata: MetadataClient,
    pub channels: ChannelClient,
    // Admin endpoints are disabled when unset
    pub admin_key: Option<String>,
    pub stats: ServiceStats,
    #[allow(dead_code)]
    temp_db_path: Option<tempfile::NamedTempFile>,
}

const TEST_UNREACHABLE_BASE: &str = "http://127.0.0.1:9";
pub const TEST_ADMIN_KEY: &str = "test-admin-key";
pub const TEST_SEARCHAPI_KEY: &str = "test-searchapi-key";

impl AppState {
    pub fn new_for_testing() -> Self {
        Self::new_for_testing_with_clients(None, None)
    }

    pub fn new_for_testing_with_openai_client(
        openai_client: Option<Arc<dyn OpenAIClientTrait>>,
    ) -> Self {
        Self::new_for_testing_with_clients(openai_client, None)
    }

    /// Testing state backed by a temporary SQLite file. When `upstream_base`
    /// is given, SearchAPI and YouTube requests go there (with a test API
    /// key); otherwise SearchAPI is unconfigured and YouTube is unreachable.
    pub fn new_for_testing_with_clients(
        openai_client: Option<Arc<dyn OpenAIClientTrait>>,
        upstream_base: Option<&str>,
    ) -> Self {
        let temp_db_file = tempfile::NamedTempFile::new()
            .expect("Failed to create temporary database file");
        let db_path = temp_db_file
            .path()
            .to_str()
            .expect("Failed to get temp file path")
            .to_string();

        let pool = Pool::new(SqliteConnectionManager::file(&db_path))
            .expect("Failed to create pool");
        let mut conn = pool.get().expect("Failed to get connection");
        init_db(&mut conn).expect("Failed to initialize database");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        let (searchapi_key, base) = match upstream_base {
            Some(base) => (Some(TEST_SEARCHAPI_KEY.to_string()), base),
            None => (None, TEST_UNREACHABLE_BASE),
        };
        let searchapi =
            SearchApiClient::new(http.clone(), searchapi_key, base);

        Self {
            db: pool,
            openai_client,
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            metadata: MetadataClient::new(http.clone(), searchapi.clone(), base),
            channels: ChannelClient::new(http, searchapi.clone(), base),
            searchapi,
            admin_key: Some(TEST_ADMIN_KEY.to_string()),
            stats: ServiceStats::new(),
            temp_db_path: Some(temp_db_file),
        }
    }
}

pub struct AppConfig {
    pub db_pool: Pool<SqliteConnectionManager>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub summary_model: String,
    pub searchapi_key: Option<String>,
    pub searchapi_base: String,
    pub youtube_base: String,
    pub admin_key: Option<String>,
    pub http_timeout: Duration,
}

pub fn create_app_state(config: AppConfig) -> Result<Arc<AppState>> {
    let openai_client = match maybe_create_openai_client(
        config.openai_api_key,
        config.openai_api_base,
    ) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("{}; summaries will use the extractive fallback", e);
            None
        }
    };

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let searchapi = SearchApiClient::new(
        http.clone(),
        config.searchapi_key,
        config.searchapi_base,
    );
    if !searchapi.is_configured() {
        warn!("SEARCHAPI_KEY not set; transcript requests will fail");
    }

    let admin_key = config.admin_key.filter(|k| !k.trim().is_empty());
    if admin_key.is_none() {
        info!("No admin key configured, admin endpoints disabled");
    }

    Ok(Arc::new(AppState {
        db: config.db_pool,
        openai_client,
        summary_model: config.summary_model,
        metadata: MetadataClient::new(
            http.clone(),
            searchapi.clone(),
            config.youtube_base.clone(),
        ),
        channels: ChannelClient::new(
            http,
            searchapi.clone(),
            config.youtube_base,
        ),
        searchapi,
        admin_key,
        stats: ServiceStats::new(),
        temp_db_path: None,
    }))
}

fn migration_steps() -> Vec<M<'static>> {
    vec![
        M::up(
            r#"
            CREATE TABLE IF NOT EXISTS transcripts (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                transcript TEXT NOT NULL,
                summary TEXT NOT NULL,
                created_at INTEGER NOT NULL         -- Unix time in milliseconds
            );

            CREATE TABLE IF NOT EXISTS status_checks (
                id TEXT PRIMARY KEY,
                client_name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        ),
        M::up(
            r#"
            ALTER TABLE transcripts ADD COLUMN title TEXT;
            ALTER TABLE transcripts ADD COLUMN channel TEXT;
            ALTER TABLE transcripts ADD COLUMN thumbnail_url TEXT;
            ALTER TABLE transcripts
                ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0;
            UPDATE transcripts SET updated_at = created_at;
            "#,
        ),
        M::up(
            r#"
            ALTER TABLE transcripts
                ADD COLUMN summary_source TEXT NOT NULL DEFAULT 'llm';

            CREATE INDEX IF NOT EXISTS idx_transcripts_created_at
                ON transcripts(created_at DESC);
            "#,
        ),
    ]
}

// Database initialization
#[instrument(skip(conn))]
pub fn init_db(conn: &mut Connection) -> Result<()> {
    info!("Initializing database");
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Migrations::new(migration_steps()).to_latest(conn)?;
    Ok(())
}


#[cfg(test)]
mod app_state_tests {
    use super::{create_app_state, AppConfig};
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn config(admin_key: Option<&str>) -> (AppConfig, NamedTempFile) {
        let temp_file = NamedTempFile::new().expect("temp sqlite file");
        let manager = SqliteConnectionManager::file(
            temp_file.path().to_str().expect("temp path"),
        );
        let pool = Pool::new(manager).expect("pool");
        let config = AppConfig {
            db_pool: pool,
            openai_api_key: None,
            openai_api_base: None,
            summary_model: "test-model".to_string(),
            searchapi_key: None,
            searchapi_base: "http://localhost:1".to_string(),
            youtube_base: "http://localhost:1".to_string(),
            admin_key: admin_key.map(str::to_string),
            http_timeout: Duration::from_secs(1),
        };
        (config, temp_file)
    }

    #[test]
    fn create_app_state_without_keys() {
        let (config, _file) = config(Some("  "));
        let state = create_app_state(config).expect("state");
        assert!(state.openai_client.is_none());
        assert!(!state.searchapi.is_configured());
        assert!(state.admin_key.is_none());
        assert_eq!(state.summary_model, "test-model");
    }

    #[test]
    fn create_app_state_keeps_admin_key() {
        let (config, _file) = config(Some("secret"));
        let state = create_app_state(config).expect("state");
        assert_eq!(state.admin_key.as_deref(), Some("secret"));
    }
}
