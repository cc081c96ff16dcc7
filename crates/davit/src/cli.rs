use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct DavitArgs {
    /// Default basic-auth username.
    #[arg(long, env = "DAVIT_USERNAME", default_value = "admin")]
    pub username: String,

    /// Default basic-auth password.
    #[arg(long, env = "DAVIT_PASSWORD", default_value = "password")]
    pub password: String,

    /// Credentials file with one `user:pass` per line; supersedes the
    /// default username/password when set.
    #[arg(long, env = "DAVIT_ACCOUNTS_FILE")]
    pub accounts_file: Option<PathBuf>,

    /// Let GET/HEAD requests through without an Authorization header.
    #[arg(long, env = "DAVIT_ANONYMOUS_ACCESS", default_value_t = false)]
    pub anonymous_access: bool,

    /// Root directory for stored artifacts.
    #[arg(long, env = "DAVIT_STORAGE_PATH", default_value = "./artifacts")]
    pub storage_path: PathBuf,

    /// HTTP listen port.
    #[arg(long, env = "DAVIT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Comma-separated upstream mirror base URLs, tried in order on miss.
    #[arg(long, env = "DAVIT_PROXY_URLS", value_delimiter = ',')]
    pub proxy_urls: Vec<String>,

    /// Run the periodic snapshot cleanup task.
    #[arg(long, env = "DAVIT_SNAPSHOT_CLEANUP_ENABLED", default_value_t = false)]
    pub snapshot_cleanup_enabled: bool,

    /// Snapshot cleanup interval, e.g. `1h` or `30m`.
    #[arg(long, env = "DAVIT_SNAPSHOT_CLEANUP_INTERVAL", default_value = "1h")]
    pub snapshot_cleanup_interval: String,

    /// Delete snapshot versions whose newest file is older than this many
    /// days; 0 disables the age rule.
    #[arg(long, env = "DAVIT_SNAPSHOT_KEEP_DAYS", default_value_t = 30)]
    pub snapshot_keep_days: u32,

    /// Keep only the newest snapshot version per directory.
    #[arg(long, env = "DAVIT_SNAPSHOT_KEEP_LATEST_ONLY", default_value_t = false)]
    pub snapshot_keep_latest_only: bool,

    /// Expose Prometheus metrics on this address, e.g. `127.0.0.1:9000`.
    #[arg(long, env = "DAVIT_METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,
}
