//! Request matching logic.
//!
//! A [`Matcher`] checks one dimension of a request. A [`RequestPattern`] is
//! the conjunction of the matchers compiled from a [`RequestMatcher`]; it is
//! used both to select stubs and to query the request log.

use crate::config::{QueryMatcher, RequestMatcher, UrlMatcher};
use crate::error::ConfigError;
use crate::request::IncomingRequest;
use base64::Engine;
use regex::Regex;
use std::fmt;

/// A single predicate over an incoming request.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Method, compared case-insensitively
    Method(String),
    /// Path plus query string, byte-equal
    UrlEqual(String),
    /// Path without query string, full regex match
    UrlPathPattern(FullMatch),
    /// Some occurrence of the parameter has exactly this value
    QueryParamEqual { name: String, value: String },
    /// Some occurrence of the parameter fully matches the regex
    QueryParamPattern { name: String, pattern: FullMatch },
    /// Some occurrence of the header has exactly this value
    HeaderEqual { name: String, value: String },
    /// `Authorization: Basic` carrying exactly these credentials
    BasicAuth { username: String, password: String },
}

impl Matcher {
    pub fn url_path_pattern(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Matcher::UrlPathPattern(FullMatch::new(pattern)?))
    }

    pub fn query_param_pattern(name: &str, pattern: &str) -> Result<Self, ConfigError> {
        Ok(Matcher::QueryParamPattern {
            name: name.to_string(),
            pattern: FullMatch::new(pattern)?,
        })
    }

    /// Evaluate against a request. Absent fields never match.
    pub fn matches(&self, request: &IncomingRequest) -> bool {
        match self {
            Matcher::Method(method) => request.method().eq_ignore_ascii_case(method),
            Matcher::UrlEqual(url) => request.url() == *url,
            Matcher::UrlPathPattern(pattern) => pattern.is_match(request.path()),
            Matcher::QueryParamEqual { name, value } => {
                request.query_values(name).any(|v| v == value.as_str())
            }
            Matcher::QueryParamPattern { name, pattern } => {
                request.query_values(name).any(|v| pattern.is_match(v))
            }
            Matcher::HeaderEqual { name, value } => {
                request.header_values(name).any(|v| v == value.as_str())
            }
            Matcher::BasicAuth { username, password } => {
                match request.header("Authorization").and_then(decode_basic_auth) {
                    Some(decoded) => decoded == format!("{}:{}", username, password),
                    None => false,
                }
            }
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Method(method) => write!(f, "method == {}", method),
            Matcher::UrlEqual(url) => write!(f, "url == {}", url),
            Matcher::UrlPathPattern(pattern) => write!(f, "path ~ {}", pattern),
            Matcher::QueryParamEqual { name, value } => write!(f, "query.{} == {:?}", name, value),
            Matcher::QueryParamPattern { name, pattern } => {
                write!(f, "query.{} ~ {}", name, pattern)
            }
            Matcher::HeaderEqual { name, value } => write!(f, "header.{} == {:?}", name, value),
            Matcher::BasicAuth { username, .. } => write!(f, "basic_auth == {}:***", username),
        }
    }
}

/// Decode the credentials of an `Authorization: Basic <token>` header.
fn decode_basic_auth(header: &str) -> Option<String> {
    let token = header.strip_prefix("Basic ")?.trim();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(token)
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// A regex that must match the whole input.
#[derive(Debug, Clone)]
pub struct FullMatch {
    source: String,
    regex: Regex,
}

impl FullMatch {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            ConfigError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for FullMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Conjunction of matchers. An empty pattern matches every request.
#[derive(Debug, Clone, Default)]
pub struct RequestPattern {
    matchers: Vec<Matcher>,
}

impl RequestPattern {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    /// Compile a declarative request matcher, rejecting invalid regexes.
    pub fn compile(def: &RequestMatcher) -> Result<Self, ConfigError> {
        let mut matchers = Vec::new();

        if let Some(method) = &def.method {
            matchers.push(Matcher::Method(method.clone()));
        }

        match &def.url {
            Some(UrlMatcher::Equal { value }) => matchers.push(Matcher::UrlEqual(value.clone())),
            Some(UrlMatcher::PathPattern { pattern }) => {
                matchers.push(Matcher::url_path_pattern(pattern)?)
            }
            None => {}
        }

        for (name, qm) in &def.query {
            matchers.push(match qm {
                QueryMatcher::Exact { value } => Matcher::QueryParamEqual {
                    name: name.clone(),
                    value: value.clone(),
                },
                QueryMatcher::Regex { pattern } => Matcher::query_param_pattern(name, pattern)?,
            });
        }

        for (name, value) in &def.headers {
            matchers.push(Matcher::HeaderEqual {
                name: name.clone(),
                value: value.clone(),
            });
        }

        if let Some(creds) = &def.basic_auth {
            matchers.push(Matcher::BasicAuth {
                username: creds.username.clone(),
                password: creds.password.clone(),
            });
        }

        Ok(Self { matchers })
    }

    pub fn matches(&self, request: &IncomingRequest) -> bool {
        self.matchers.iter().all(|m| m.matches(request))
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    pub fn is_catch_all(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl fmt::Display for RequestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matchers.is_empty() {
            return f.write_str("<any>");
        }
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            write!(f, "{}", m)?;
        }
        Ok(())
    }
}
