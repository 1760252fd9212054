use std::path::PathBuf;

use clap::Parser;

/// labelkit: key/value labels for services and users over a small REST API.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "LABELKIT_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090", env = "LABELKIT_PORT")]
    pub port: u16,

    /// Path to a JSONL file for label persistence.
    /// If omitted (and no database is configured), labels are in-memory only.
    #[arg(long, env = "LABELKIT_LABELS_FILE")]
    pub labels_file: Option<PathBuf>,

    /// PostgreSQL connection URL. Takes precedence over --labels-file.
    #[cfg(feature = "postgres")]
    #[arg(long, env = "LABELKIT_DATABASE_URL")]
    pub database_url: Option<String>,

    /// API token clients must send in `X-API-Token`.
    /// A random token is generated when omitted.
    #[arg(long, env = "LABELKIT_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}
