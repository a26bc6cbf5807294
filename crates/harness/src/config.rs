// Harness configuration.
//
// Layered: defaults, then an optional TOML file
// (`~/.adminprobe/config.toml` or `--config`), then `ADMINPROBE_*`
// environment variables, then command-line flags (applied in main).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ADMIN_CONSOLE_PATH: &str = "/loleaflet/dist/admin/admin.html";
const ADMIN_CHANNEL_PATH: &str = "/lool/adminws/";

/// Root directory for harness state: `~/.adminprobe/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".adminprobe"))
}

/// Path to the default config file: `~/.adminprobe/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Base URL of the document server (`http://` or `https://`).
    pub server_url: String,
    pub admin_user: String,
    pub admin_password: String,
    /// Whether the server runs with TLS, enabling the login and
    /// authenticated-channel steps. Unset means "infer from `server_url`".
    pub secure_transport: Option<bool>,
    /// Bound on each request/notification exchange.
    pub message_timeout_ms: u64,
    /// Bound on the whole run.
    pub run_timeout_ms: u64,
    /// Period of the trigger that advances the run.
    pub trigger_interval_ms: u64,
    /// Directory holding the test documents (`hello.odt`, ...).
    pub data_dir: PathBuf,
    /// Run the `rmdoc` notification step.
    pub rmdoc_check: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server_url: "https://127.0.0.1:9980".into(),
            admin_user: "admin".into(),
            admin_password: "admin".into(),
            secure_transport: None,
            message_timeout_ms: 5_000,
            run_timeout_ms: 60_000,
            trigger_interval_ms: 50,
            data_dir: PathBuf::from("test/data"),
            rmdoc_check: true,
        }
    }
}

impl HarnessConfig {
    /// Load from `~/.adminprobe/config.toml`, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match global_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Overlay `ADMINPROBE_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `ADMINPROBE_SERVER_URL` | `server_url` |
    /// | `ADMINPROBE_ADMIN_USER` | `admin_user` |
    /// | `ADMINPROBE_ADMIN_PASSWORD` | `admin_password` |
    /// | `ADMINPROBE_SECURE_TRANSPORT` | `secure_transport` |
    /// | `ADMINPROBE_MESSAGE_TIMEOUT_MS` | `message_timeout_ms` |
    /// | `ADMINPROBE_RUN_TIMEOUT_MS` | `run_timeout_ms` |
    /// | `ADMINPROBE_DATA_DIR` | `data_dir` |
    /// | `ADMINPROBE_RMDOC_CHECK` | `rmdoc_check` |
    ///
    /// Unparseable numbers and booleans are ignored.
    pub fn with_env(self) -> Self {
        self.with_env_fn(|key| std::env::var(key))
    }

    /// Testable variant that accepts an environment lookup function.
    fn with_env_fn<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Ok(url) = env("ADMINPROBE_SERVER_URL") {
            self.server_url = url;
        }
        if let Ok(user) = env("ADMINPROBE_ADMIN_USER") {
            self.admin_user = user;
        }
        if let Ok(password) = env("ADMINPROBE_ADMIN_PASSWORD") {
            self.admin_password = password;
        }
        if let Some(secure) = env("ADMINPROBE_SECURE_TRANSPORT").ok().and_then(|v| parse_bool(&v))
        {
            self.secure_transport = Some(secure);
        }
        if let Some(ms) = env("ADMINPROBE_MESSAGE_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()) {
            self.message_timeout_ms = ms;
        }
        if let Some(ms) = env("ADMINPROBE_RUN_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()) {
            self.run_timeout_ms = ms;
        }
        if let Ok(dir) = env("ADMINPROBE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(check) = env("ADMINPROBE_RMDOC_CHECK").ok().and_then(|v| parse_bool(&v)) {
            self.rmdoc_check = check;
        }
        self
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms.max(1))
    }

    /// Explicit `secure_transport`, else true for an `https` server URL.
    pub fn secure_transport_available(&self) -> bool {
        self.secure_transport
            .unwrap_or_else(|| Url::parse(&self.server_url).is_ok_and(|url| url.scheme() == "https"))
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::from_server_url(&self.server_url)
    }
}

/// Server URLs the harness talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    http_base: Url,
    ws_base: Url,
}

impl Endpoints {
    pub fn from_server_url(server_url: &str) -> Result<Self, ConfigError> {
        let http_base = Url::parse(server_url)
            .map_err(|source| ConfigError::InvalidUrl { url: server_url.to_owned(), source })?;
        let ws_scheme = match http_base.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(ConfigError::UnsupportedScheme(other.to_owned())),
        };
        let mut ws_base = http_base.clone();
        ws_base
            .set_scheme(ws_scheme)
            .map_err(|()| ConfigError::UnsupportedScheme(ws_scheme.to_owned()))?;
        Ok(Self { http_base, ws_base })
    }

    /// Admin console page guarded by HTTP Basic auth.
    pub fn admin_console(&self) -> Url {
        with_path(&self.http_base, ADMIN_CONSOLE_PATH)
    }

    /// Directory the admin console's `jwt` cookie must be scoped to.
    pub fn admin_cookie_path(&self) -> &'static str {
        "/loleaflet/dist/admin/"
    }

    pub fn admin_channel(&self) -> Url {
        with_path(&self.ws_base, ADMIN_CHANNEL_PATH)
    }

    /// Editing channel for the document at `doc_url`.
    pub fn document_channel(&self, doc_url: &str) -> Url {
        let encoded: String = url::form_urlencoded::byte_serialize(doc_url.as_bytes()).collect();
        with_path(&self.ws_base, &format!("/lool/{encoded}/ws"))
    }
}

fn with_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    url
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid server url `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported server url scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),
}
