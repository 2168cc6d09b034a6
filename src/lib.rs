//! Mock Stub Engine
//!
//! The matching engine behind a programmable HTTP mock server: register
//! declarative stubs, dispatch incoming requests to the best matching stub,
//! and verify afterwards which requests were received.
//!
//! # Features
//!
//! - **Request Matching**: Match by method, exact URL, path regex, query params,
//!   headers and basic auth credentials
//! - **Priorities**: Explicit priorities outrank unprioritized stubs; ties go to
//!   the most recently registered stub
//! - **Request Log**: Every dispatched request is recorded for verification
//! - **Verification**: Assert how many requests matched a pattern
//!
//! # Example Configuration
//!
//! ```yaml
//! stubs:
//!   - name: user-by-name
//!     request:
//!       method: GET
//!       url:
//!         type: path_pattern
//!         pattern: /company/100/users
//!       query:
//!         name:
//!           type: regex
//!           pattern: "[a-zA-Z]+"
//!     response:
//!       status: 200
//!       body:
//!         type: file
//!         path: get-user-by-name-response.json
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod request;
pub mod request_log;
pub mod server;
pub mod stub;
pub mod verify;

pub use config::MockServerConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{ConfigError, VerificationError};
pub use matcher::{Matcher, RequestPattern};
pub use registry::StubRegistry;
pub use request::IncomingRequest;
pub use request_log::{RequestLog, RequestLogEntry};
pub use server::MockServer;
pub use stub::{Priority, StubId, StubRule};
pub use verify::CountMatch;
