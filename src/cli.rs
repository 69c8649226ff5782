use crate::metadata::DEFAULT_YOUTUBE_BASE;
use crate::searchapi::DEFAULT_SEARCHAPI_BASE;
use crate::DEFAULT_SUMMARY_MODEL;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the summarizer server
#[derive(Parser, Debug, Clone)]
#[command(version, about = "YouTube transcript summarizer API")]
pub struct Args {
    /// Path to the SQLite database
    #[arg(long, env = "TUBENOTES_DB", default_value = "data/tubenotes.db")]
    pub db: PathBuf,

    /// Host to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8001)]
    pub port: u16,

    /// SearchAPI.io key used for transcripts and metadata
    #[arg(long, env = "SEARCHAPI_KEY")]
    pub searchapi_key: Option<String>,

    /// SearchAPI.io base URL
    #[arg(long, env = "SEARCHAPI_BASE", default_value = DEFAULT_SEARCHAPI_BASE)]
    pub searchapi_base: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,

    /// Model used for summaries
    #[arg(long, env = "SUMMARY_MODEL", default_value = DEFAULT_SUMMARY_MODEL)]
    pub summary_model: String,

    /// YouTube base URL for scraping and oEmbed
    #[arg(long, env = "YOUTUBE_BASE", default_value = DEFAULT_YOUTUBE_BASE)]
    pub youtube_base: String,

    /// Key required in the X-Admin-Key header; admin routes are disabled
    /// without it
    #[arg(long, env = "ADMIN_KEY")]
    pub admin_key: Option<String>,

    /// Comma-separated allowed CORS origins, or "*"
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Timeout for outbound HTTP requests, in seconds
    #[arg(long, default_value_t = 30)]
    pub http_timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let args = Args::try_parse_from(["tubenotes_server"]).unwrap();
        assert_eq!(args.port, 8001);
        assert_eq!(args.summary_model, "gpt-3.5-turbo");
        assert_eq!(args.searchapi_base, DEFAULT_SEARCHAPI_BASE);
        assert_eq!(args.http_timeout_secs, 30);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "tubenotes_server",
            "--port",
            "9000",
            "--admin-key",
            "secret",
            "--cors-origins",
            "http://localhost:3000",
        ])
        .unwrap();
        assert_eq!(args.port, 9000);
        assert_eq!(args.admin_key.as_deref(), Some("secret"));
        assert_eq!(args.cors_origins, "http://localhost:3000");
    }
}
