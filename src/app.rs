use crate::channel::{ChannelVideos, DEFAULT_CHANNEL_LIMIT};
use crate::cli::Args;
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::status::{self, StatusCheck};
use crate::summary::{self, SummarySource};
use crate::transcripts::{self, StoredTranscript, TranscriptWrite};
use crate::transcription;
use crate::video_id::extract_video_id;
use crate::{AppState, StatsSnapshot, DEFAULT_HISTORY_LIMIT};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    routing::{delete, get, post},
    Json, Router,
};
use clap::Parser;
use hmac::{Hmac, Mac};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::predicate::{
    NotForContentType, Predicate, SizeAbove,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

// Add build-time information
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const ROOT_MESSAGE: &str = "YouTube Summarizer API is running";

// Health check endpoint
#[instrument]
pub async fn health_check() -> &'static str {
    debug!("Health check requested");
    "OK"
}

#[instrument(level = "debug")]
fn ensure_db_directory(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
    {
        if !parent.exists() {
            info!("Creating database directory {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Cannot create database directory '{}': {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }
    Ok(())
}

fn get_build_info() -> String {
    let mut parts = vec![format!("Version {}", built_info::PKG_VERSION)];
    for (label, value) in [
        ("Built", built_info::BUILT_TIME_UTC),
        ("Profile", built_info::PROFILE),
        ("Target", built_info::TARGET),
        ("Rustc", built_info::RUSTC_VERSION),
    ] {
        let value = value.trim();
        if !value.is_empty() {
            parts.push(format!("{} {}", label, value));
        }
    }
    parts.join(" • ")
}

#[axum::debug_handler]
async fn root() -> Json<Value> {
    Json(json!({
        "message": ROOT_MESSAGE,
        "version": built_info::PKG_VERSION,
        "build": get_build_info(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub youtube_url: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub transcript: String,
    pub summary: String,
    pub summary_source: SummarySource,
    pub video_id: String,
    pub url: String,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_cached: bool,
}

impl SummarizeResponse {
    fn from_record(record: StoredTranscript, is_cached: bool) -> Self {
        Self {
            transcript: record.transcript,
            summary: record.summary,
            summary_source: record.summary_source,
            video_id: record.video_id,
            url: record.url,
            title: record.title,
            channel: record.channel,
            thumbnail_url: record.thumbnail_url,
            is_cached,
        }
    }
}

#[axum::debug_handler]
async fn summarize_video(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SummarizeRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    state.stats.summarize_requests.fetch_add(1, Ordering::Relaxed);
    match summarize_flow(&state, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            state.stats.error_count.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

/// Serve from the store when possible; otherwise fetch the transcript and
/// metadata, summarize, and save. A forced refresh reuses the stored
/// transcript and only redoes metadata and summary.
#[instrument(skip(state), fields(url = %request.youtube_url))]
async fn summarize_flow(
    state: &AppState,
    request: &SummarizeRequest,
) -> ApiResult<SummarizeResponse> {
    let url = request.youtube_url.trim();
    let video_id = extract_video_id(url)?;
    info!("Summarize request for video {}", video_id);

    let existing =
        transcripts::get_transcript_by_video_id(state, &video_id).await?;
    if let Some(record) = existing.clone() {
        if !request.force_refresh {
            info!("Serving cached summary for {}", video_id);
            state.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(SummarizeResponse::from_record(record, true));
        }
    }

    let transcript = match existing.filter(|r| !r.transcript.is_empty()) {
        Some(record) => {
            info!("Reusing stored transcript for {}", video_id);
            record.transcript
        }
        None => transcription::get_transcript(&state.searchapi, &video_id).await?,
    };

    let metadata = state.metadata.fetch(&video_id).await;
    let summary = summary::summarize(state, &transcript, &metadata).await;

    let record = transcripts::upsert_transcript(
        state,
        &TranscriptWrite {
            video_id: &video_id,
            url,
            transcript: &transcript,
            summary: &summary.text,
            summary_source: summary.source,
            metadata: &metadata,
        },
    )
    .await?;

    Ok(SummarizeResponse::from_record(record, false))
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[axum::debug_handler]
async fn get_history(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> ApiResult<Json<Vec<StoredTranscript>>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let records = transcripts::list_recent_transcripts(&state, limit).await?;
    Ok(Json(records))
}

#[axum::debug_handler]
async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<StoredTranscript>> {
    transcripts::get_transcript_by_video_id(&state, &video_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Transcript not found"))
}

#[axum::debug_handler]
async fn get_channel_videos(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Json<ChannelVideos> {
    let limit = params.limit.unwrap_or(DEFAULT_CHANNEL_LIMIT);
    Json(state.channels.recent_videos(&channel, limit).await)
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<summary::ModelInfo>,
}

#[axum::debug_handler]
async fn get_available_models(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ModelsResponse>> {
    if state.openai_client.is_none() {
        return Err(ApiError::Unavailable(
            "OpenAI API key not configured".to_string(),
        ));
    }
    let models = summary::get_available_models(&state).await?;
    Ok(Json(ModelsResponse { models }))
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckCreate {
    pub client_name: String,
}

#[axum::debug_handler]
async fn create_status_check(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<StatusCheckCreate>,
) -> ApiResult<Json<StatusCheck>> {
    let check = status::create_status_check(&state, &input.client_name).await?;
    Ok(Json(check))
}

#[axum::debug_handler]
async fn get_status_checks(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<StatusCheck>>> {
    Ok(Json(status::list_status_checks(&state).await?))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    pub cached_transcripts: i64,
    pub llm_configured: bool,
    pub searchapi_configured: bool,
}

#[axum::debug_handler]
async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        counters: state.stats.snapshot(),
        cached_transcripts: transcripts::count_transcripts(&state).await?,
        llm_configured: state.openai_client.is_some(),
        searchapi_configured: state.searchapi.is_configured(),
    }))
}

type HmacSha256 = Hmac<Sha256>;

/// Compares keys in constant time by checking MACs keyed with the expected
/// key, so neither content nor length leaks through timing.
fn admin_key_matches(expected: &str, provided: &str) -> bool {
    let tag = |message: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(message.as_bytes());
            mac
        })
    };
    match (tag(expected), tag(provided)) {
        (Ok(reference), Ok(candidate)) => candidate
            .verify_slice(&reference.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = state.admin_key.as_deref() else {
        return Err(ApiError::forbidden("Admin endpoints are disabled"));
    };
    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if admin_key_matches(expected, key) => Ok(()),
        Some(_) => {
            warn!("Rejected admin request with a wrong key");
            Err(ApiError::unauthorized("Invalid admin key"))
        }
        None => Err(ApiError::unauthorized("Missing admin key")),
    }
}

#[axum::debug_handler]
async fn admin_delete_transcript(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_admin(&state, &headers)?;
    if !transcripts::delete_transcript(&state, &video_id).await? {
        return Err(ApiError::not_found("Transcript not found"));
    }
    info!("Admin deleted transcript {}", video_id);
    Ok(Json(json!({ "deleted": 1, "video_id": video_id })))
}

#[axum::debug_handler]
async fn admin_clear_transcripts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let deleted = transcripts::delete_all_transcripts(&state).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// `*` allows any origin; otherwise a comma-separated origin list.
pub fn cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins = origins.trim();
    if origins.is_empty() || origins == "*" {
        return layer.allow_origin(Any);
    }
    let list: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(list))
}

pub fn routes(state: Arc<AppState>) -> Router {
    routes_with_cors(state, cors_layer("*"))
}

pub fn routes_with_cors(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let predicate = SizeAbove::new(32)
        // still don't compress gRPC
        .and(NotForContentType::GRPC)
        // still don't compress images
        .and(NotForContentType::IMAGES);

    let compression_layer = CompressionLayer::new()
        .br(true)
        .deflate(true)
        .gzip(true)
        .zstd(true)
        .compress_when(predicate);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/", get(root))
        .route("/api/summarize", post(summarize_video))
        .route("/api/history", get(get_history))
        .route("/api/transcripts/{video_id}", get(get_transcript))
        .route("/api/channel/{channel}/videos", get(get_channel_videos))
        .route("/api/models", get(get_available_models))
        .route(
            "/api/status",
            get(get_status_checks).post(create_status_check),
        )
        .route("/api/stats", get(get_stats))
        .route("/api/admin/transcripts", delete(admin_clear_transcripts))
        .route(
            "/api/admin/transcripts/{video_id}",
            delete(admin_delete_transcript),
        )
        .layer(compression_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received CTRL-C, initiating shutdown");
}

pub async fn serve() -> Result<()> {
    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    // Parse command line arguments
    let args = Args::parse();

    info!("Starting tubenotes {}", get_build_info());

    info!("Opening database at {}", args.db.display());
    ensure_db_directory(&args.db)?;
    let db_pool = Pool::new(SqliteConnectionManager::file(&args.db))?;
    {
        let mut conn = db_pool.get()?;
        crate::init_db(&mut conn)?;
    }

    let state = crate::create_app_state(crate::AppConfig {
        db_pool,
        openai_api_key: args.openai_api_key,
        openai_api_base: args.openai_api_base,
        summary_model: args.summary_model,
        searchapi_key: args.searchapi_key,
        searchapi_base: args.searchapi_base,
        youtube_base: args.youtube_base,
        admin_key: args.admin_key,
        http_timeout: Duration::from_secs(args.http_timeout_secs),
    })?;

    // Start web server
    let app = routes_with_cors(state, cors_layer(&args.cors_origins));
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
