//! Configuration for the mock stub engine.
//!
//! Declarative stub definitions, request matchers and response descriptors.
//! The same [`RequestMatcher`] shape is used to register stubs and to query
//! the request log during verification.

use crate::error::ConfigError;
use crate::matcher::RequestPattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Main configuration for a mock server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// List of stub definitions, registered in order
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Response when no stub matches (404 with no body if unset)
    #[serde(default)]
    pub default_response: Option<ResponseDefinition>,
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, stub) in self.stubs.iter().enumerate() {
            stub.validate().map_err(|e| ConfigError::Stub {
                index,
                source: Box::new(e),
            })?;
        }
        if let Some(default) = &self.default_response {
            default.validate()?;
        }
        Ok(())
    }
}

/// A single stub definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubDefinition {
    /// Optional name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Request matcher
    #[serde(default)]
    pub request: RequestMatcher,

    /// Response to return
    pub response: ResponseDefinition,

    /// Priority (lower = matched first, unset = normal)
    #[serde(default)]
    pub priority: Option<u32>,
}

impl StubDefinition {
    pub fn new(request: RequestMatcher, response: ResponseDefinition) -> Self {
        Self {
            name: None,
            request,
            response,
            priority: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Validate the stub definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        RequestPattern::compile(&self.request)?;
        self.response.validate()
    }
}

/// Request matching configuration. Every configured part must hold.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RequestMatcher {
    /// HTTP method to match (unset = any)
    #[serde(default)]
    pub method: Option<String>,

    /// URL matching
    #[serde(default)]
    pub url: Option<UrlMatcher>,

    /// Query parameter matching
    #[serde(default)]
    pub query: BTreeMap<String, QueryMatcher>,

    /// Header matching (exact value, case-insensitive name)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Basic auth credentials
    #[serde(default)]
    pub basic_auth: Option<BasicAuthCredentials>,
}

impl RequestMatcher {
    /// Matches every request.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn get(url: UrlMatcher) -> Self {
        Self::any().method("GET").url(url)
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn url(mut self, url: UrlMatcher) -> Self {
        self.url = Some(url);
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, matcher: QueryMatcher) -> Self {
        self.query.insert(name.into(), matcher);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuthCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// URL matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UrlMatcher {
    /// Path and query string must equal the value
    Equal { value: String },
    /// Path (without query) must fully match the regex
    PathPattern { pattern: String },
}

impl UrlMatcher {
    pub fn equal(value: impl Into<String>) -> Self {
        UrlMatcher::Equal {
            value: value.into(),
        }
    }

    pub fn path_pattern(pattern: impl Into<String>) -> Self {
        UrlMatcher::PathPattern {
            pattern: pattern.into(),
        }
    }
}

/// Query parameter matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryMatcher {
    /// Exact value match
    Exact { value: String },
    /// Regex pattern match
    Regex { pattern: String },
}

impl QueryMatcher {
    pub fn exact(value: impl Into<String>) -> Self {
        QueryMatcher::Exact {
            value: value.into(),
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        QueryMatcher::Regex {
            pattern: pattern.into(),
        }
    }
}

/// Credentials expected in an `Authorization: Basic` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

/// Response definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: Option<ResponseBody>,
}

fn default_status() -> u16 {
    200
}

impl ResponseDefinition {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::with_status(200)
    }

    /// 404 with no headers and no body, returned when nothing matches.
    pub fn not_found() -> Self {
        Self::with_status(404)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Validate the response definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=599).contains(&self.status) {
            return Err(ConfigError::InvalidStatus(self.status));
        }
        Ok(())
    }
}

/// Response body configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
    /// Named body file, resolved by the transport against a files root
    File { path: String },
}

impl ResponseBody {
    pub fn text(content: impl Into<String>) -> Self {
        ResponseBody::Text {
            content: content.into(),
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        ResponseBody::File { path: path.into() }
    }

    /// Get the body content as bytes, reading file bodies relative to `files_root`.
    pub fn to_bytes(&self, files_root: &Path) -> anyhow::Result<Vec<u8>> {
        match self {
            ResponseBody::Text { content } => Ok(content.as_bytes().to_vec()),
            ResponseBody::Json { content } => Ok(serde_json::to_string(content)?.into_bytes()),
            ResponseBody::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map_err(|e| anyhow::anyhow!("Invalid base64: {}", e))
            }
            ResponseBody::File { path } => {
                let full = files_root.join(path);
                std::fs::read(&full)
                    .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", full.display(), e))
            }
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched stubs
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Directory that `file` bodies are resolved against
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            files_root: default_files_root(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_files_root() -> PathBuf {
    PathBuf::from("__files")
}
