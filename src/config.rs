use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command line configuration for the dashboard web server.
#[derive(Clone, Debug, Parser)]
#[command(name = "dashboard-web", about = "Campaign analytics dashboard server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Directory served under /static
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Idle lifetime of a session, in seconds
    #[arg(long, default_value_t = 86_400)]
    pub session_ttl_secs: u64,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Most sessions kept in memory before the least recently used is evicted
    #[arg(long, default_value_t = 1_000)]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
            session_ttl_secs: 86_400,
            max_upload_mb: 20,
            max_sessions: 1_000,
        }
    }
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
