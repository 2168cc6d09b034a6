//! Mock server facade.
//!
//! Ties a registry, its settings and the default response together for one
//! test scope. The transport layer hands requests to [`MockServer::handle`]
//! and serializes what comes back. Dropping the server drops its registry
//! and request log with it.

use crate::config::{GlobalSettings, MockServerConfig, RequestMatcher, ResponseDefinition, StubDefinition};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{ConfigError, VerificationError};
use crate::matcher::RequestPattern;
use crate::registry::StubRegistry;
use crate::request::IncomingRequest;
use crate::request_log::RequestLogEntry;
use crate::stub::StubId;
use crate::verify::{self, CountMatch};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Mock server state for one test scope.
pub struct MockServer {
    registry: StubRegistry,
    settings: GlobalSettings,
    default_response: Option<ResponseDefinition>,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Total requests matched to stubs.
    requests_matched: AtomicU64,
    /// Total requests unmatched.
    requests_unmatched: AtomicU64,
}

/// A response with its body resolved to bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl RenderedResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    /// Create an empty server with default settings.
    pub fn new() -> Self {
        Self {
            registry: StubRegistry::new(),
            settings: GlobalSettings::default(),
            default_response: None,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Create a server and register every stub of `config` in order.
    pub fn from_config(config: MockServerConfig) -> Result<Self, ConfigError> {
        // Stubs are compiled and checked once, by `register_all`.
        if let Some(default) = &config.default_response {
            default.validate()?;
        }

        let server = Self {
            registry: StubRegistry::new(),
            settings: config.settings,
            default_response: config.default_response,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        };
        server.registry.register_all(&config.stubs)?;

        info!(
            stubs = server.registry.len(),
            files_root = %server.settings.files_root.display(),
            "Mock server initialized"
        );
        Ok(server)
    }

    /// Create from a YAML configuration string.
    ///
    /// Parses without the separate validation pass of
    /// [`MockServerConfig::from_yaml`]; `from_config` reports the same errors.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: MockServerConfig = serde_yaml::from_str(yaml)?;
        Self::from_config(config)
    }

    pub fn stub_for(&self, def: &StubDefinition) -> Result<StubId, ConfigError> {
        self.registry.register(def)
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// Dispatch a request, updating counters and logging the outcome.
    pub fn dispatch(&self, request: &IncomingRequest) -> DispatchOutcome {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let outcome = Dispatcher::new(&self.registry).dispatch(request);
        match &outcome {
            DispatchOutcome::Matched(rule) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        stub_id = %rule.id(),
                        stub = rule.name().unwrap_or(""),
                        method = %request.method(),
                        url = %request.url(),
                        "Request matched stub"
                    );
                }
            }
            DispatchOutcome::Unmatched => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method(),
                        url = %request.url(),
                        "No matching stub found"
                    );
                }
            }
        }
        outcome
    }

    /// Response for an outcome; the configured default response covers misses.
    pub fn response_for(&self, outcome: &DispatchOutcome) -> ResponseDefinition {
        match outcome {
            DispatchOutcome::Matched(rule) => rule.response().clone(),
            DispatchOutcome::Unmatched => self
                .default_response
                .clone()
                .unwrap_or_else(ResponseDefinition::not_found),
        }
    }

    /// Dispatch a request and return the response to send back.
    pub fn handle(&self, request: &IncomingRequest) -> ResponseDefinition {
        let outcome = self.dispatch(request);
        self.response_for(&outcome)
    }

    /// Dispatch a request and resolve the response body against the files root.
    pub fn handle_rendered(&self, request: &IncomingRequest) -> anyhow::Result<RenderedResponse> {
        let response = self.handle(request);
        self.render(&response)
    }

    pub fn render(&self, response: &ResponseDefinition) -> anyhow::Result<RenderedResponse> {
        let body = match &response.body {
            Some(body) => body.to_bytes(&self.settings.files_root)?,
            None => Vec::new(),
        };
        Ok(RenderedResponse {
            status: response.status,
            headers: response.headers.clone(),
            body,
        })
    }

    /// Logged requests matching `matcher`.
    pub fn find_requests(
        &self,
        matcher: &RequestMatcher,
    ) -> Result<Vec<Arc<RequestLogEntry>>, ConfigError> {
        let pattern = RequestPattern::compile(matcher)?;
        Ok(self.registry.request_log().find(&pattern))
    }

    pub fn count_requests(&self, matcher: &RequestMatcher) -> Result<usize, ConfigError> {
        let pattern = RequestPattern::compile(matcher)?;
        Ok(self.registry.request_log().count_matching(&pattern))
    }

    /// Check that at least one matching request was received.
    pub fn verify(&self, matcher: &RequestMatcher) -> Result<(), VerificationError> {
        self.verify_count(matcher, CountMatch::default())
    }

    pub fn verify_count(
        &self,
        matcher: &RequestMatcher,
        expected: CountMatch,
    ) -> Result<(), VerificationError> {
        let pattern = RequestPattern::compile(matcher)?;
        verify::verify(self.registry.request_log(), &pattern, expected)
    }

    /// Drop all stubs and logged requests.
    pub fn reset(&self) {
        self.registry.reset();
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueryMatcher, ResponseBody, UrlMatcher};

    const COMPANY_USERS: &str = include_str!("../demos/default-config.yaml");
    const BASIC_AUTH: &str = include_str!("../demos/basic-auth.yaml");

    const JACK: &str = "amFja0BnbWFpbC5jb206MTIzNDU=";
    const VASYA: &str = "dmFzeWFAbWFpbC5ydToxMjM0NTY=";

    fn company_users() -> MockServer {
        MockServer::from_yaml(COMPANY_USERS).unwrap()
    }

    fn users_path() -> RequestMatcher {
        RequestMatcher::get(UrlMatcher::path_pattern("/company/100/users"))
    }

    #[test]
    fn test_server_creation() {
        let server = company_users();
        assert_eq!(server.registry().len(), 7);
        assert_eq!(server.total_requests(), 0);
    }

    #[test]
    fn test_user_name_lower_case() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/100/users?name=bob"))
            .unwrap();

        server
            .verify(&users_path().query_param("name", QueryMatcher::exact("bob")))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_json().unwrap()["name"], "Bob");
    }

    #[test]
    fn test_user_name_upper_case() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/100/users?name=BOB"))
            .unwrap();

        server
            .verify(&users_path().query_param("name", QueryMatcher::exact("BOB")))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_json().unwrap()["name"], "Bob");
    }

    #[test]
    fn test_empty_name_lists_all_users() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/100/users?name="))
            .unwrap();

        server
            .verify(&users_path().query_param("name", QueryMatcher::exact("")))
            .unwrap();
        assert_eq!(response.status, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body["users"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_unknown_name() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/100/users?name=Tommy"))
            .unwrap();

        server
            .verify(&RequestMatcher::get(UrlMatcher::equal(
                "/company/100/users?name=Tommy",
            )))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_json().unwrap()["message"], "User not found");
    }

    #[test]
    fn test_all_users_in_company() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/100/users"))
            .unwrap();

        server
            .verify(&RequestMatcher::get(UrlMatcher::equal("/company/100/users")))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        let body = response.body_json().unwrap();
        assert_eq!(body["users"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_unknown_company() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/333/users"))
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body_json().unwrap()["message"], "Company not found");
    }

    #[test]
    fn test_company_without_users() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/111/users"))
            .unwrap();

        assert_eq!(response.status, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body["users"].as_array().map(Vec::is_empty), Some(true));
    }

    #[test]
    fn test_company_by_id() {
        let server = company_users();
        let response = server
            .handle_rendered(&IncomingRequest::get("/company/100"))
            .unwrap();

        server
            .verify_count(
                &RequestMatcher::get(UrlMatcher::equal("/company/100")),
                CountMatch::Exactly(1),
            )
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_json().unwrap()["name"], "OOO Magnit");
    }

    #[test]
    fn test_unregistered_path_is_plain_404() {
        let server = company_users();
        let response = server.handle(&IncomingRequest::get("/company/999/users"));
        assert_eq!(response, ResponseDefinition::not_found());
        assert_eq!(server.total_unmatched(), 1);

        let rendered = server.render(&response).unwrap();
        assert!(rendered.body.is_empty());
    }

    #[test]
    fn test_configured_default_response() {
        let server = MockServer::from_yaml(
            r#"
default_response:
  status: 418
  body:
    type: text
    content: "no stub"
"#,
        )
        .unwrap();
        let response = server
            .handle_rendered(&IncomingRequest::get("/anything"))
            .unwrap();
        assert_eq!(response.status, 418);
        assert_eq!(response.body_text(), "no stub");
    }

    #[test]
    fn test_basic_auth_own_company() {
        let server = MockServer::from_yaml(BASIC_AUTH).unwrap();

        let response = server
            .handle_rendered(
                &IncomingRequest::get("/company/100/users")
                    .with_header("Authorization", format!("Basic {}", JACK)),
            )
            .unwrap();
        assert_eq!(response.status, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body["users"].as_array().map(Vec::len), Some(3));

        let response = server
            .handle_rendered(
                &IncomingRequest::get("/company/100/users?name=Bob")
                    .with_header("Authorization", format!("Basic {}", JACK)),
            )
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_json().unwrap()["name"], "Bob");
    }

    #[test]
    fn test_basic_auth_foreign_company() {
        let server = MockServer::from_yaml(BASIC_AUTH).unwrap();

        for target in ["/company/100/users", "/company/100/users?name=Bob"] {
            let response = server
                .handle_rendered(
                    &IncomingRequest::get(target)
                        .with_header("Authorization", format!("Basic {}", VASYA)),
                )
                .unwrap();
            assert_eq!(response.status, 403);
            assert_eq!(
                response.body_json().unwrap()["message"],
                "Access denied for user"
            );
        }

        let vasya = RequestMatcher::any().basic_auth("vasya@mail.ru", "123456");
        assert_eq!(server.count_requests(&vasya).unwrap(), 2);
    }

    #[test]
    fn test_basic_auth_verification_count() {
        let server = MockServer::from_yaml(BASIC_AUTH).unwrap();
        server.handle(&IncomingRequest::get("/company/100/users").with_basic_auth("vasya@mail.ru", "123456"));
        server.handle(&IncomingRequest::get("/company/100/users").with_basic_auth("jack@gmail.com", "12345"));

        let vasya = RequestMatcher::any().basic_auth("vasya@mail.ru", "123456");
        server.verify_count(&vasya, CountMatch::Exactly(1)).unwrap();
        assert_eq!(server.find_requests(&vasya).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_credentials_are_unmatched() {
        let server = MockServer::from_yaml(BASIC_AUTH).unwrap();
        let response = server.handle(
            &IncomingRequest::get("/company/100/users").with_header("Authorization", "Basic ???"),
        );
        assert_eq!(response.status, 404);
        assert_eq!(server.total_unmatched(), 1);
        assert_eq!(server.total_matched(), 0);
    }

    #[test]
    fn test_verify_failure() {
        let server = company_users();
        let err = server
            .verify(&RequestMatcher::get(UrlMatcher::equal("/company/100")))
            .unwrap_err();
        assert!(matches!(
            err,
            VerificationError::CountMismatch { actual: 0, .. }
        ));

        let err = server
            .verify(&RequestMatcher::any().url(UrlMatcher::path_pattern("(")))
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidPattern(_)));
    }

    #[test]
    fn test_programmatic_stubs_and_reset() {
        let server = MockServer::new();
        server
            .stub_for(
                &StubDefinition::new(
                    users_path().query_param("name", QueryMatcher::regex("[a-zA-Z]+")),
                    ResponseDefinition::ok().body(ResponseBody::text("user-by-name")),
                )
                .named("user-by-name"),
            )
            .unwrap();

        let response = server.handle(&IncomingRequest::get("/company/100/users?name=bob"));
        assert_eq!(response.body, Some(ResponseBody::text("user-by-name")));
        assert_eq!(server.total_matched(), 1);

        server.reset();
        assert!(server.registry().find_all().is_empty());
        assert!(server.registry().request_log().is_empty());
        assert_eq!(
            server.handle(&IncomingRequest::get("/company/100/users?name=bob")).status,
            404
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = MockServer::from_yaml(
            r#"
stubs:
  - request:
      query:
        name:
          type: regex
          pattern: "[a-z"
    response:
      status: 200
"#,
        );
        assert!(matches!(result, Err(ConfigError::Stub { index: 0, .. })));

        let result = MockServer::from_yaml(
            r#"
stubs:
  - request:
      url:
        type: equal
        value: /ok
    response:
      status: 200
  - request:
      url:
        type: equal
        value: /teapot
    response:
      status: 42
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Stub { index: 1, source }) if matches!(*source, ConfigError::InvalidStatus(42))
        ));
    }

    #[test]
    fn test_invalid_default_response_is_rejected() {
        let result = MockServer::from_yaml(
            r#"
default_response:
  status: 1000
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidStatus(1000))));
    }

    #[test]
    fn test_settings_come_from_config() {
        let server = company_users();
        assert_eq!(server.settings().files_root, std::path::PathBuf::from("demos/__files"));

        let server = MockServer::new();
        assert_eq!(server.settings().files_root, std::path::PathBuf::from("__files"));
    }
}
