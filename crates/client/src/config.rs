//! Client configuration
//!
//! Values are resolved from environment variables, then an `openforms.toml`
//! file, then built-in defaults. The file uses the same dotted keys as the
//! environment of the form API:
//!
//! ```toml
//! base.uri = "https://forms.example.nl"
//! base.path = "api/v2"
//! csrf.cookie.name = "csrftoken"
//! csrf.header.name = "X-CSRFToken"
//! session.cookie.name = "openforms_sessionid"
//! polling.timeout = 120
//! polling.interval = 2
//! ```

use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OpenFormsError, OpenFormsResult};

/// Environment variable naming the config file to load
pub const CONFIG_PATH_ENV: &str = "OPENFORMS_CONFIG";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "openforms.toml";

/// Configuration for the OpenForms API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenFormsConfig {
    /// Name of the cookie carrying the CSRF secret
    pub csrf_cookie_name: String,

    /// Name of the header carrying the rotating CSRF token
    pub csrf_header_name: String,

    /// Name of the session cookie
    pub session_cookie_name: String,

    /// Scheme and host of the OpenForms instance, e.g. `https://forms.example.nl`
    pub base_uri: String,

    /// Path of the API below `base_uri`
    pub base_path: String,

    /// Upper bound for waiting on submission processing
    #[serde(with = "duration_secs")]
    pub polling_timeout: Duration,

    /// Pause between two status checks
    #[serde(with = "duration_secs")]
    pub polling_interval: Duration,

    /// Per-request timeout of the HTTP client
    #[serde(with = "duration_secs")]
    pub http_timeout: Duration,

    /// Delete the submission's authentication session after completion
    pub delete_session: bool,

    /// Accept the statement of truth in addition to the privacy policy
    pub accept_statement_of_truth: bool,
}

impl Default for OpenFormsConfig {
    fn default() -> Self {
        Self {
            csrf_cookie_name: "csrftoken".to_string(),
            csrf_header_name: "X-CSRFToken".to_string(),
            session_cookie_name: "openforms_sessionid".to_string(),
            base_uri: String::new(),
            base_path: "api/v2".to_string(),
            polling_timeout: Duration::from_secs(120),
            polling_interval: Duration::from_secs(2),
            http_timeout: Duration::from_secs(30),
            delete_session: true,
            accept_statement_of_truth: true,
        }
    }
}

// Layout of the TOML file. Every key is optional and falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    base: BaseSection,
    csrf: CsrfSection,
    session: SessionSection,
    polling: PollingSection,
    http: HttpSection,
    submission: SubmissionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BaseSection {
    uri: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameSection {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsrfSection {
    cookie: NameSection,
    header: NameSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionSection {
    cookie: NameSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PollingSection {
    timeout: Option<u64>,
    interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpSection {
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubmissionSection {
    delete_session: Option<bool>,
    statement_of_truth: Option<bool>,
}

impl OpenFormsConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration the way test suites expect it.
    ///
    /// Reads the file named by `OPENFORMS_CONFIG`, or `openforms.toml` in the
    /// working directory, then applies environment overrides. A missing file
    /// is an error.
    pub fn load() -> OpenFormsResult<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::from_file(&path)?.apply_env()
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> OpenFormsResult<Self> {
        if !path.exists() {
            return Err(OpenFormsError::MissingConfig(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> OpenFormsResult<Self> {
        let file: FileConfig = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(Self {
            csrf_cookie_name: file.csrf.cookie.name.unwrap_or(defaults.csrf_cookie_name),
            csrf_header_name: file.csrf.header.name.unwrap_or(defaults.csrf_header_name),
            session_cookie_name: file
                .session
                .cookie
                .name
                .unwrap_or(defaults.session_cookie_name),
            base_uri: file.base.uri.unwrap_or(defaults.base_uri),
            base_path: file.base.path.unwrap_or(defaults.base_path),
            polling_timeout: file
                .polling
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.polling_timeout),
            polling_interval: file
                .polling
                .interval
                .map(Duration::from_secs)
                .unwrap_or(defaults.polling_interval),
            http_timeout: file
                .http
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            delete_session: file
                .submission
                .delete_session
                .unwrap_or(defaults.delete_session),
            accept_statement_of_truth: file
                .submission
                .statement_of_truth
                .unwrap_or(defaults.accept_statement_of_truth),
        })
    }

    /// Apply overrides from the process environment.
    ///
    /// Environment variables:
    /// - `OPENFORMS_BASE_URI`, `OPENFORMS_BASE_PATH`
    /// - `OPENFORMS_CSRF_COOKIE_NAME`, `OPENFORMS_CSRF_HEADER_NAME`
    /// - `OPENFORMS_SESSION_COOKIE_NAME`
    /// - `OPENFORMS_POLLING_TIMEOUT`, `OPENFORMS_POLLING_INTERVAL` (seconds)
    pub fn apply_env(self) -> OpenFormsResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> OpenFormsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OPENFORMS_BASE_URI") {
            self.base_uri = v;
        }
        if let Some(v) = lookup("OPENFORMS_BASE_PATH") {
            self.base_path = v;
        }
        if let Some(v) = lookup("OPENFORMS_CSRF_COOKIE_NAME") {
            self.csrf_cookie_name = v;
        }
        if let Some(v) = lookup("OPENFORMS_CSRF_HEADER_NAME") {
            self.csrf_header_name = v;
        }
        if let Some(v) = lookup("OPENFORMS_SESSION_COOKIE_NAME") {
            self.session_cookie_name = v;
        }
        if let Some(v) = lookup("OPENFORMS_POLLING_TIMEOUT") {
            self.polling_timeout = parse_seconds("OPENFORMS_POLLING_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("OPENFORMS_POLLING_INTERVAL") {
            self.polling_interval = parse_seconds("OPENFORMS_POLLING_INTERVAL", &v)?;
        }
        Ok(self)
    }

    /// Check that the configuration can drive a workflow
    pub fn validate(&self) -> OpenFormsResult<()> {
        if self.base_uri.is_empty() {
            return Err(OpenFormsError::Config("base.uri is not set".to_string()));
        }
        if !(self.base_uri.starts_with("http://") || self.base_uri.starts_with("https://")) {
            return Err(OpenFormsError::Config(format!(
                "base.uri must be an http(s) URL, got '{}'",
                self.base_uri
            )));
        }
        if HeaderName::from_bytes(self.csrf_header_name.as_bytes()).is_err() {
            return Err(OpenFormsError::Config(format!(
                "csrf.header.name '{}' is not a valid header name",
                self.csrf_header_name
            )));
        }
        if self.polling_interval.is_zero() {
            return Err(OpenFormsError::Config(
                "polling.interval must be greater than zero".to_string(),
            ));
        }
        if self.polling_interval > self.polling_timeout {
            return Err(OpenFormsError::Config(format!(
                "polling.interval ({}s) exceeds polling.timeout ({}s)",
                self.polling_interval.as_secs(),
                self.polling_timeout.as_secs()
            )));
        }
        Ok(())
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = uri.into();
        self
    }

    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.polling_interval = interval;
        self.polling_timeout = timeout;
        self
    }

    pub fn with_delete_session(mut self, delete: bool) -> Self {
        self.delete_session = delete;
        self
    }

    pub fn with_statement_of_truth(mut self, accept: bool) -> Self {
        self.accept_statement_of_truth = accept;
        self
    }

    fn base(&self) -> &str {
        self.base_uri.trim_end_matches('/')
    }

    /// Absolute URL of an API path such as `/forms/contact`
    pub fn api_url(&self, path: &str) -> String {
        let base_path = self.base_path.trim_matches('/');
        if base_path.is_empty() {
            format!("{}{}", self.base(), path)
        } else {
            format!("{}/{}{}", self.base(), base_path, path)
        }
    }

    /// URL of the page a browser loads to start filling in a form
    pub fn form_url(&self, form_name: &str) -> String {
        format!("{}/{}", self.base(), form_name)
    }

    /// API resource URL of a form, as referenced when opening a submission
    pub fn form_endpoint(&self, form_uuid: &str) -> String {
        self.api_url(&format!("/forms/{}", form_uuid))
    }

    /// Page URL of a single form step
    pub fn step_page_url(&self, form_name: &str, step_slug: &str) -> String {
        format!("{}/{}/stap/{}", self.base(), form_name, step_slug)
    }

    /// Page URL of the submission overview
    pub fn overview_page_url(&self, form_name: &str) -> String {
        format!("{}/{}/overzicht", self.base(), form_name)
    }

    /// Resolve a status URL returned by the API, which may be relative
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base(), url)
        } else {
            format!("{}/{}", self.base(), url)
        }
    }
}

fn parse_seconds(key: &str, value: &str) -> OpenFormsResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| OpenFormsError::Config(format!("invalid {}: {}", key, e)))
}

/// Durations as whole seconds, the unit used by the property file
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = OpenFormsConfig::default();
        assert_eq!(config.csrf_cookie_name, "csrftoken");
        assert_eq!(config.csrf_header_name, "X-CSRFToken");
        assert_eq!(config.session_cookie_name, "openforms_sessionid");
        assert_eq!(config.base_uri, "");
        assert_eq!(config.base_path, "api/v2");
        assert_eq!(config.polling_timeout, Duration::from_secs(120));
        assert_eq!(config.polling_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_dotted_keys() {
        let toml = r#"
base.uri = "https://forms.example.nl"
csrf.cookie.name = "csrf"
csrf.header.name = "X-CSRF"
session.cookie.name = "sid"
polling.timeout = 30
polling.interval = 1

[submission]
delete_session = false
"#;
        let config = OpenFormsConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.base_uri, "https://forms.example.nl");
        assert_eq!(config.base_path, "api/v2");
        assert_eq!(config.csrf_cookie_name, "csrf");
        assert_eq!(config.csrf_header_name, "X-CSRF");
        assert_eq!(config.session_cookie_name, "sid");
        assert_eq!(config.polling_timeout, Duration::from_secs(30));
        assert_eq!(config.polling_interval, Duration::from_secs(1));
        assert!(!config.delete_session);
        assert!(config.accept_statement_of_truth);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = OpenFormsConfig::from_toml_str("").unwrap();
        assert_eq!(config, OpenFormsConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openforms.toml");
        let err = OpenFormsConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, OpenFormsError::MissingConfig(p) if p == path));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openforms.toml");
        std::fs::write(&path, "base.uri = \"http://localhost:8000\"\n").unwrap();

        let config = OpenFormsConfig::from_file(&path).unwrap();
        assert_eq!(config.base_uri, "http://localhost:8000");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("OPENFORMS_BASE_URI", "http://override:9000"),
            ("OPENFORMS_POLLING_INTERVAL", "5"),
        ]
        .into_iter()
        .collect();

        let config = OpenFormsConfig::default()
            .with_base_uri("http://file:8000")
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.base_uri, "http://override:9000");
        assert_eq!(config.polling_interval, Duration::from_secs(5));
        assert_eq!(config.polling_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let err = OpenFormsConfig::default()
            .apply_overrides(|key| (key == "OPENFORMS_POLLING_TIMEOUT").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("OPENFORMS_POLLING_TIMEOUT"));
    }

    #[test]
    fn test_validate() {
        assert!(OpenFormsConfig::default().validate().is_err());
        assert!(OpenFormsConfig::default()
            .with_base_uri("forms.example.nl")
            .validate()
            .is_err());
        assert!(OpenFormsConfig::default()
            .with_base_uri("https://forms.example.nl")
            .with_polling(Duration::from_secs(10), Duration::from_secs(5))
            .validate()
            .is_err());
        assert!(OpenFormsConfig::default()
            .with_base_uri("https://forms.example.nl")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_derived_urls() {
        let config = OpenFormsConfig::default().with_base_uri("https://forms.example.nl/");

        assert_eq!(
            config.api_url("/forms/contact"),
            "https://forms.example.nl/api/v2/forms/contact"
        );
        assert_eq!(config.form_url("contact"), "https://forms.example.nl/contact");
        assert_eq!(
            config.form_endpoint("f-1"),
            "https://forms.example.nl/api/v2/forms/f-1"
        );
        assert_eq!(
            config.step_page_url("contact", "intro"),
            "https://forms.example.nl/contact/stap/intro"
        );
        assert_eq!(
            config.overview_page_url("contact"),
            "https://forms.example.nl/contact/overzicht"
        );
        assert_eq!(
            config.resolve_url("/api/v2/submissions/s-1/status"),
            "https://forms.example.nl/api/v2/submissions/s-1/status"
        );
        assert_eq!(
            config.resolve_url("https://other.example.nl/status"),
            "https://other.example.nl/status"
        );
    }

    #[test]
    fn test_durations_serialize_as_seconds() {
        let config = OpenFormsConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["polling_timeout"], 120);
        assert_eq!(value["polling_interval"], 2);
        assert_eq!(value["http_timeout"], 30);

        let back: OpenFormsConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_empty_base_path() {
        let config = OpenFormsConfig::default()
            .with_base_uri("http://localhost")
            .with_base_path("");
        assert_eq!(config.api_url("/submissions"), "http://localhost/submissions");
    }
}
