// Configuration: loads the API credential and settings once at startup.
//
// Sources, lowest precedence first: built-in defaults, the optional JSON
// settings file, then environment variables (a .env file is loaded by main).
// The resulting Config is immutable and shared behind an Arc.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::TopicalError;

pub const DEFAULT_BASE_URL: &str = "https://api-inference.modelscope.cn/v1/";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-Coder-32B-Instruct";
pub const DEFAULT_CONFIG_PATH: &str = "config/api_config.json";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 8501;

/// The analysis service credential.
///
/// Debug output never shows the secret. The only way to get one out of
/// a `Config` is `require_api_key`, so anything holding an `ApiKey` knows a
/// credential was configured.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Validate and wrap a raw key. Surrounding whitespace is trimmed; empty
    /// keys and keys with inner whitespace or control characters are rejected.
    pub fn parse(raw: &str, source: &str) -> Result<Self, TopicalError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(TopicalError::Configuration(format!(
                "API key from {source} is empty"
            )));
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TopicalError::Configuration(format!(
                "API key from {source} is malformed (contains whitespace or control characters)"
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short hint for status output: first four characters, rest masked.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}****")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.redacted())
    }
}

/// Optional JSON settings file (`config/api_config.json`).
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Read the settings file. A missing file is fine (`None`); a file that
    /// exists but can't be read or parsed is a configuration error.
    pub fn read(path: &Path) -> Result<Option<Self>, TopicalError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            TopicalError::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        let file = serde_json::from_str(&text).map_err(|e| {
            TopicalError::Configuration(format!("Invalid JSON in {}: {e}", path.display()))
        })?;
        Ok(Some(file))
    }
}

/// Central configuration, loaded once at process start and shared read-only.
///
/// Secrets come from the environment (a .env file is loaded by main via
/// dotenvy), from a token file, or from the JSON settings file.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<ApiKey>,
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
    /// Space outgoing calls at most this many per second (unset = no pacing).
    pub max_requests_per_second: Option<f64>,
    pub db_path: String,
    pub reports_dir: PathBuf,
    pub bind: String,
    pub port: u16,
    /// Dashboard password (TOPICAL_WEB_PASSWORD). Unset means no login.
    pub web_password: Option<String>,
    /// Secret for HMAC session cookies (TOPICAL_SESSION_SECRET).
    pub session_secret: Option<String>,
    /// Where the JSON settings file was looked for.
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_requests_per_second: None,
            db_path: "./topical.db".to_string(),
            reports_dir: PathBuf::from("./reports"),
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            web_password: None,
            session_secret: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the settings file.
    pub fn load() -> Result<Self, TopicalError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables.
    ///
    /// Precedence: defaults < settings file < environment. A missing API key
    /// is not an error here; callers that dispatch analyses call
    /// `require_api_key`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TopicalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config_path = var("TOPICAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = ConfigFile::read(&config_path)?.unwrap_or_default();

        let mut config = Config {
            config_path: config_path.clone(),
            ..Config::default()
        };

        // --- credential ---
        config.api_key = if let Some(raw) = var("TOPICAL_API_KEY") {
            Some(ApiKey::parse(&raw, "TOPICAL_API_KEY")?)
        } else if let Some(path) = var("TOPICAL_API_KEY_FILE") {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                TopicalError::Configuration(format!("Failed to read API key file {path}: {e}"))
            })?;
            Some(ApiKey::parse(&raw, &path)?)
        } else {
            match file.api_key.as_deref() {
                // An empty key in the settings file means "not configured yet".
                Some(raw) if !raw.trim().is_empty() => {
                    Some(ApiKey::parse(raw, &config_path.display().to_string())?)
                }
                _ => None,
            }
        };

        // --- endpoint ---
        if let Some(url) = var("TOPICAL_BASE_URL").or(file.base_url) {
            config.base_url = validate_base_url(&url)?;
        }
        if let Some(model) = var("TOPICAL_MODEL").or(file.model) {
            config.model = model.trim().to_string();
        }

        let timeout_secs = match var("TOPICAL_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("TOPICAL_TIMEOUT_SECS", &raw)?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(TopicalError::Configuration(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        config.request_timeout = Duration::from_secs(timeout_secs);

        if let Some(raw) = var("TOPICAL_MAX_QPS") {
            let qps = parse_number::<f64>("TOPICAL_MAX_QPS", &raw)?;
            if !(qps > 0.0 && qps.is_finite()) {
                return Err(TopicalError::Configuration(format!(
                    "TOPICAL_MAX_QPS must be a positive number, got {raw}"
                )));
            }
            // The limiter spaces calls 1/qps apart; that gap must fit a Duration.
            if Duration::try_from_secs_f64(1.0 / qps).is_err() {
                return Err(TopicalError::Configuration(format!(
                    "TOPICAL_MAX_QPS is too small to pace requests, got {raw}"
                )));
            }
            config.max_requests_per_second = Some(qps);
        }

        // --- storage and server ---
        if let Some(path) = var("TOPICAL_DB_PATH") {
            config.db_path = path;
        }
        if let Some(dir) = var("TOPICAL_REPORTS_DIR") {
            config.reports_dir = PathBuf::from(dir);
        }
        if let Some(bind) = var("TOPICAL_BIND") {
            config.bind = bind;
        }
        if let Some(raw) = var("TOPICAL_PORT") {
            config.port = parse_number::<u16>("TOPICAL_PORT", &raw)?;
        }
        config.web_password = var("TOPICAL_WEB_PASSWORD");
        config.session_secret = var("TOPICAL_SESSION_SECRET");

        Ok(config)
    }

    /// Check that the API key is configured and hand it out.
    /// Call this before anything that talks to the analysis service.
    pub fn require_api_key(&self) -> Result<&ApiKey, TopicalError> {
        self.api_key.as_ref().ok_or_else(|| {
            TopicalError::Configuration(
                "TOPICAL_API_KEY not set. Add it to your .env file, point \
                 TOPICAL_API_KEY_FILE at a token file, or fill in api_key in \
                 config/api_config.json."
                    .to_string(),
            )
        })
    }

    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn validate_base_url(raw: &str) -> Result<String, TopicalError> {
    let trimmed = raw.trim();
    let url = reqwest::Url::parse(trimmed).map_err(|e| {
        TopicalError::Configuration(format!("Invalid base URL {trimmed:?}: {e}"))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(TopicalError::Configuration(format!(
            "Base URL must be http or https, got {trimmed:?}"
        )));
    }
    Ok(trimmed.to_string())
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, TopicalError> {
    raw.trim().parse::<T>().map_err(|_| {
        TopicalError::Configuration(format!("{name} must be a number, got {raw:?}"))
    })
}
