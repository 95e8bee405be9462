//! HTTP plumbing between a [`SwarmUser`](../user/struct.SwarmUser.html) and the notes API.
//!
//! A single [`SwarmClient`] is built when the load test starts and cloned into every
//! user. Cloning is cheap: the underlying `reqwest::Client` shares one connection pool.
//!
//! Every call returns an [`ApiResponse`] instead of a `Result`: transport errors,
//! unexpected status codes and unparsable bodies are all observations to record, not
//! reasons to stop the user.

use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::SwarmConfiguration;
use crate::metrics::Outcome;
use crate::SwarmError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Default path of the notes collection.
pub const DEFAULT_NOTES_PATH: &str = "/api/notes";
/// Default path of the sign-up endpoint.
pub const DEFAULT_SIGNUP_PATH: &str = "/auth/v1/signup";
/// Default path of the password token exchange.
pub const DEFAULT_TOKEN_PATH: &str = "/auth/v1/token?grant_type=password";

/// Methods used to talk to the notes API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwarmMethod {
    Delete,
    Get,
    Post,
    Put,
}

impl fmt::Display for SwarmMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let method = match self {
            SwarmMethod::Delete => "DELETE",
            SwarmMethod::Get => "GET",
            SwarmMethod::Post => "POST",
            SwarmMethod::Put => "PUT",
        };
        write!(f, "{}", method)
    }
}

impl From<SwarmMethod> for http::Method {
    fn from(method: SwarmMethod) -> Self {
        match method {
            SwarmMethod::Delete => http::Method::DELETE,
            SwarmMethod::Get => http::Method::GET,
            SwarmMethod::Post => http::Method::POST,
            SwarmMethod::Put => http::Method::PUT,
        }
    }
}

/// Which server a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The notes API, `--host`.
    Api,
    /// The identity service, `--auth-host` (defaults to `--host`).
    Auth,
}

/// What a successful response must contain to count as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any 2xx response.
    Nothing,
    /// A 2xx response with a JSON body.
    Json,
    /// A 2xx response carrying the id of the created note.
    NoteId,
    /// A 2xx response carrying a non-empty `access_token`.
    AccessToken,
}

/// Paths of every route the swarm calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRoutes {
    pub notes: String,
    pub signup: String,
    pub token: String,
}

impl Default for NoteRoutes {
    fn default() -> Self {
        NoteRoutes {
            notes: DEFAULT_NOTES_PATH.to_string(),
            signup: DEFAULT_SIGNUP_PATH.to_string(),
            token: DEFAULT_TOKEN_PATH.to_string(),
        }
    }
}

impl NoteRoutes {
    /// Every note.
    pub fn list_all(&self) -> String {
        self.notes.clone()
    }

    /// Notes owned by the caller.
    pub fn list_own(&self) -> String {
        format!("{}/mine", self.notes.trim_end_matches('/'))
    }

    /// Where new notes are posted.
    pub fn create(&self) -> String {
        self.notes.clone()
    }

    /// A single note.
    pub fn note(&self, id: &str) -> String {
        format!("{}/{}", self.notes.trim_end_matches('/'), id)
    }
}

/// Shared HTTP client for all users.
#[derive(Debug, Clone)]
pub struct SwarmClient {
    client: Client,
    api_host: Url,
    auth_host: Url,
    /// Routes requests are sent to.
    pub routes: NoteRoutes,
}

impl SwarmClient {
    /// Build the client from a validated configuration.
    pub fn new(configuration: &SwarmConfiguration) -> Result<Self, SwarmError> {
        let api_host = parse_host(&configuration.host, "--host")?;
        let auth_host = match configuration.auth_host.as_deref() {
            Some(host) if !host.is_empty() => parse_host(host, "--auth-host")?,
            _ => api_host.clone(),
        };

        let mut builder = Client::builder().user_agent(APP_USER_AGENT).gzip(true);
        if let Some(timeout) = configuration.timeout_ms() {
            builder = builder.timeout(Duration::from_millis(timeout as u64));
        }
        let client = builder.build()?;

        Ok(SwarmClient {
            client,
            api_host,
            auth_host,
            routes: configuration.routes(),
        })
    }

    /// Prepend the right host to a path.
    ///
    /// A path that already includes a host is used as is.
    pub fn build_url(&self, target: Target, path: &str) -> Result<Url, url::ParseError> {
        if let Ok(url) = Url::parse(path) {
            if url.host().is_some() {
                return Ok(url);
            }
        }
        let base = match target {
            Target::Api => &self.api_host,
            Target::Auth => &self.auth_host,
        };
        base.join(path)
    }

    /// Perform one request and capture everything needed to classify it.
    pub async fn send(
        &self,
        target: Target,
        method: SwarmMethod,
        path: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> ApiResponse {
        let started = Instant::now();
        let url = match self.build_url(target, path) {
            Ok(url) => url,
            Err(e) => {
                warn!("failed to build url from path {}: {}", path, e);
                return ApiResponse::transport_failure(method, path, e.to_string(), started);
            }
        };

        let mut request = self.client.request(method.into(), url.clone());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {}: {}", method, url, e);
                return ApiResponse::transport_failure(method, url.as_str(), e.to_string(), started);
            }
        };

        let status = response.status().as_u16();
        debug!("{} {}: status_code {}", method, url, status);
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!("{} {}: failed to read body: {}", method, url, e);
                return ApiResponse::transport_failure(method, url.as_str(), e.to_string(), started);
            }
        };

        let (body, decode_error) = if text.trim().is_empty() {
            (None, None)
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => (Some(value), None),
                Err(e) => (None, Some(e.to_string())),
            }
        };

        ApiResponse {
            method,
            url: url.to_string(),
            status,
            body,
            decode_error,
            transport_error: None,
            response_time: started.elapsed().as_millis() as u64,
        }
    }
}

fn parse_host(host: &str, option: &str) -> Result<Url, SwarmError> {
    Url::parse(host).map_err(|parse_error| SwarmError::InvalidHost {
        host: host.to_string(),
        detail: format!("Invalid {}.", option),
        parse_error,
    })
}

/// Everything observed about one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub method: SwarmMethod,
    pub url: String,
    /// HTTP status code, 0 if no response arrived.
    pub status: u16,
    /// Parsed JSON body, `None` for an empty or unparsable body.
    pub body: Option<Value>,
    /// Why the body could not be parsed.
    pub decode_error: Option<String>,
    /// Why no response arrived.
    pub transport_error: Option<String>,
    /// Milliseconds from sending the request to reading the whole body.
    pub response_time: u64,
}

impl ApiResponse {
    fn transport_failure(
        method: SwarmMethod,
        url: &str,
        error: String,
        started: Instant,
    ) -> Self {
        ApiResponse {
            method,
            url: url.to_string(),
            status: 0,
            body: None,
            decode_error: None,
            transport_error: Some(error),
            response_time: started.elapsed().as_millis() as u64,
        }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        self.transport_error.is_none() && (200..300).contains(&self.status)
    }

    /// Classify the response.
    ///
    /// # Example
    /// ```rust
    /// use notesync_swarm::client::{ApiResponse, Expect, SwarmMethod};
    /// use notesync_swarm::metrics::Outcome;
    ///
    /// let response = ApiResponse {
    ///     method: SwarmMethod::Post,
    ///     url: "http://localhost/api/notes".to_string(),
    ///     status: 201,
    ///     body: Some(serde_json::json!({"title": "no id here"})),
    ///     decode_error: None,
    ///     transport_error: None,
    ///     response_time: 12,
    /// };
    /// assert_eq!(response.outcome(Expect::Json), Outcome::Success);
    /// assert_eq!(response.outcome(Expect::NoteId), Outcome::ResponseDecodeFailure);
    /// ```
    pub fn outcome(&self, expect: Expect) -> Outcome {
        // The token exchange only succeeds with exactly 200.
        if !self.is_success() || (expect == Expect::AccessToken && self.status != 200) {
            return Outcome::HttpFailure(self.status);
        }
        let decoded = match expect {
            Expect::Nothing => true,
            Expect::Json => self.body.is_some(),
            Expect::NoteId => self.note_id().is_some(),
            Expect::AccessToken => self.access_token().is_some(),
        };
        if decoded {
            Outcome::Success
        } else {
            Outcome::ResponseDecodeFailure
        }
    }

    /// Describe a failed outcome, used to group errors.
    pub fn error_message(&self, outcome: Outcome, expect: Expect) -> Option<String> {
        match outcome {
            Outcome::Success => None,
            Outcome::HttpFailure(0) => Some(
                self.transport_error
                    .clone()
                    .unwrap_or_else(|| "no response".to_string()),
            ),
            Outcome::HttpFailure(status) => Some(match StatusCode::from_u16(status) {
                Ok(code) => code.to_string(),
                Err(_) => status.to_string(),
            }),
            Outcome::ResponseDecodeFailure => Some(match &self.decode_error {
                Some(e) => format!("invalid json: {}", e),
                None => match expect {
                    Expect::NoteId => "missing note id".to_string(),
                    Expect::AccessToken => "missing access token".to_string(),
                    _ => "empty body".to_string(),
                },
            }),
        }
    }

    /// The id of a newly created note.
    ///
    /// Accepts `{"id": ...}` as well as `[{"id": ...}]`, and both string and numeric ids.
    pub fn note_id(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let record = match body {
            Value::Array(records) => records.first()?,
            record => record,
        };
        match record.get("id")? {
            Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// The bearer token returned by a token exchange.
    pub fn access_token(&self) -> Option<String> {
        match self.body.as_ref()?.get("access_token")? {
            Value::String(token) if !token.is_empty() => Some(token.clone()),
            _ => None,
        }
    }
}
