use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::live::ViewKind;

/// jobwatch: mirrors a CI backend's live job state and re-serves it locally.
#[derive(Parser, Debug, Clone)]
#[command(name = "jobwatch")]
pub struct CliArgs {
    /// Base URL of the CI backend HTTP API
    #[arg(short = 'b', long = "backend-url", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Websocket URL of the backend's status stream (derived from --backend-url when omitted)
    #[arg(short = 'w', long = "ws-url")]
    pub ws_url: Option<String>,

    /// Local API port
    #[arg(long = "port", default_value_t = DEFAULT_LOCAL_PORT)]
    pub port: u16,

    /// View to mount at startup: dashboard, list or job:<uid> (repeatable)
    #[arg(short = 'v', long = "view")]
    pub views: Vec<String>,

    /// Number of jobs fetched per page
    #[arg(long = "page-size", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Delay before reconnecting a dropped websocket
    #[arg(long = "reconnect-delay-ms", default_value_t = RECONNECT_DELAY_MS)]
    pub reconnect_delay_ms: u64,

    /// How long notifications stay visible
    #[arg(long = "notification-timeout-secs", default_value_t = NOTIFICATION_TIMEOUT_SECS)]
    pub notification_timeout_secs: u64,

    /// Keep only the trailing N bytes of each job's live output
    #[arg(long = "output-cap")]
    pub output_cap: Option<usize>,

    /// GitHub repository (owner/name) used to check push permission
    #[arg(long = "github-repo")]
    pub github_repo: Option<String>,

    /// GitHub API base URL
    #[arg(long = "github-api-url", default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    /// File holding the stored user credentials
    #[arg(long = "credentials-file")]
    pub credentials_file: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub backend_url: String,
    pub ws_url: String,
    pub port: u16,
    pub startup_views: Vec<ViewKind>,
    pub page_size: usize,
    pub reconnect_delay: Duration,
    pub notification_timeout: Duration,
    pub output_cap: Option<usize>,
    pub github_repo: Option<String>,
    pub github_api_url: String,
    pub credentials_file: PathBuf,
}

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_LOCAL_PORT: u16 = 9880;
pub const WS_STATUS_PATH: &str = "/ws/status";

// Paging
pub const DEFAULT_PAGE_SIZE: usize = 20;

// Live updates
pub const RECONNECT_DELAY_MS: u64 = 1000;
pub const VIEW_CHANNEL_SIZE: usize = 256;

// Notifications
pub const NOTIFICATION_TIMEOUT_SECS: u64 = 6;

// HTTP client
pub const HTTP_TIMEOUT_SECS: u64 = 30;
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 4;

pub const CREDENTIALS_FILE_NAME: &str = "user.json";

impl WatchConfig {
    pub fn from_args(args: CliArgs) -> anyhow::Result<Self> {
        let backend_url = args.backend_url.trim_end_matches('/').to_string();
        let ws_url = match args.ws_url {
            Some(url) => url,
            None => derive_ws_url(&backend_url)?,
        };

        let names = if args.views.is_empty() {
            vec!["dashboard".to_string()]
        } else {
            args.views
        };
        let startup_views = names
            .iter()
            .map(|view| view.parse::<ViewKind>())
            .collect::<Result<Vec<_>, _>>()?;

        let credentials_file = args
            .credentials_file
            .unwrap_or_else(default_credentials_file);

        Ok(WatchConfig {
            backend_url,
            ws_url,
            port: args.port,
            startup_views,
            page_size: args.page_size.max(1),
            reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
            notification_timeout: Duration::from_secs(args.notification_timeout_secs),
            output_cap: args.output_cap,
            github_repo: args.github_repo,
            github_api_url: args.github_api_url.trim_end_matches('/').to_string(),
            credentials_file,
        })
    }

    /// Config pointing at `backend_url` with every other knob at its default.
    pub fn for_backend(backend_url: &str) -> anyhow::Result<Self> {
        let args = CliArgs::parse_from(["jobwatch", "--backend-url", backend_url]);
        Self::from_args(args)
    }
}

/// `http://host/api` becomes `ws://host/api/ws/status`; `https` maps to `wss`.
pub fn derive_ws_url(backend_url: &str) -> anyhow::Result<String> {
    let mut url = url::Url::parse(backend_url)?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => anyhow::bail!("Unsupported backend URL scheme: {}", other),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("Cannot derive websocket URL from {}", backend_url))?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), WS_STATUS_PATH);
    url.set_path(&path);
    Ok(url.to_string())
}

fn default_credentials_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobwatch")
        .join(CREDENTIALS_FILE_NAME)
}
