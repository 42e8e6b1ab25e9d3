use crux_http::protocol::{HttpHeader, HttpResponse as ShellResponse};
use crux_http::Http;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_HEADERS_COUNT: usize = 100;

/// Carries the core's request id to the shell and back in its logs.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Marks a shell response that stands in for a request which never got an
/// HTTP response. The body is the JSON-encoded [`HttpError`].
pub const TRANSPORT_FAILURE_HEADER: &str = "X-Transport-Failure";
const TRANSPORT_FAILURE_STATUS: u16 = 502;

/// An absolute `http(s)` URL with a host and no embedded credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: Url,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let raw = url.into();
        let reject = |reason: &str| HttpError::InvalidUrl {
            url: shorten(&raw, 100),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(reject("URL is empty"));
        }
        if raw.len() > MAX_URL_LENGTH {
            return Err(reject(&format!("URL is longer than {MAX_URL_LENGTH} bytes")));
        }

        let parsed = Url::parse(raw.trim()).map_err(|e| reject(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(reject(&format!(
                "scheme '{}' is not supported, use http or https",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(reject("URL has no host"));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(reject("URL must not embed credentials"));
        }

        Ok(Self { url: parsed })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }
}

fn shorten(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
    format!("{}...", &s[..cut])
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list with case-insensitive names. Inserting a name that
/// is already present replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        let (name, value) = (name.into(), value.into());
        check_header(&name, &value)?;

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
            return Ok(());
        }

        if self.entries.len() >= MAX_HEADERS_COUNT {
            return Err(HttpError::TooManyHeaders {
                count: self.entries.len() + 1,
                max: MAX_HEADERS_COUNT,
            });
        }
        self.entries.push((name, value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find_map(|(n, v)| n.eq_ignore_ascii_case(name).then_some(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_header(name: &str, value: &str) -> Result<(), HttpError> {
    let invalid = |reason: String| HttpError::InvalidHeader {
        name: name.chars().take(50).collect(),
        reason,
    };

    if name.is_empty() || name.len() > MAX_HEADER_NAME_LENGTH {
        return Err(invalid(format!(
            "header name must be 1 to {MAX_HEADER_NAME_LENGTH} bytes"
        )));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        return Err(invalid(format!("invalid character {c:?} in header name")));
    }
    if value.len() > MAX_HEADER_VALUE_LENGTH {
        return Err(invalid(format!(
            "header value exceeds {MAX_HEADER_VALUE_LENGTH} bytes"
        )));
    }
    if value.contains(['\r', '\n', '\0']) {
        return Err(invalid("header value contains CR, LF or NUL".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn has_request_body(&self) -> bool {
        matches!(self, HttpMethod::Post)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request, sent through the `crux_http` capability. The shell
/// owns the transport and its defaults (no timeout is set here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    method: HttpMethod,
    url: ValidatedUrl,
    headers: HttpHeaders,
    body: Option<Vec<u8>>,
    request_id: String,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: ValidatedUrl) -> Self {
        Self {
            method,
            url,
            headers: HttpHeaders::new(),
            body: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Get, ValidatedUrl::new(url)?))
    }

    pub fn post(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Post, ValidatedUrl::new(url)?))
    }

    pub fn delete(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Delete, ValidatedUrl::new(url)?))
    }

    /// Adds a request header. Framing headers belong to the transport and
    /// are rejected, as is the request id header.
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        let name = name.into();
        if ["host", "content-length", "transfer-encoding", REQUEST_ID_HEADER]
            .iter()
            .any(|reserved| name.eq_ignore_ascii_case(reserved))
        {
            return Err(HttpError::InvalidHeader {
                name,
                reason: "set by the transport".to_string(),
            });
        }
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpError> {
        if !self.method.has_request_body() {
            return Err(HttpError::InvalidRequest {
                reason: format!("{} requests cannot have a body", self.method.as_str()),
            });
        }

        let body = serde_json::to_vec(value).map_err(|e| HttpError::SerializationError {
            message: e.to_string(),
        })?;

        if body.len() > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size: body.len(),
                max: MAX_REQUEST_BODY_SIZE,
            });
        }

        self.headers.insert("Content-Type", "application/json")?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &ValidatedUrl {
        &self.url
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Hands the request to the shell and maps its answer to an
    /// [`HttpResult`] before building the app event.
    pub fn send<Ev, F>(self, http: &Http<Ev>, make_event: F)
    where
        Ev: Send + 'static,
        F: FnOnce(HttpResult) -> Ev + Send + 'static,
    {
        let url = self.url.as_str();
        let mut builder = match self.method {
            HttpMethod::Get => http.get(url),
            HttpMethod::Post => http.post(url),
            HttpMethod::Delete => http.delete(url),
        };

        builder = builder.header(REQUEST_ID_HEADER, self.request_id.as_str());
        for (name, value) in self.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = self.body {
            builder = builder.body(body);
        }

        let request_id = self.request_id;
        builder.send(move |result| make_event(into_result(result, request_id)));
    }
}

fn into_result(
    result: crux_http::Result<crux_http::Response<Vec<u8>>>,
    request_id: String,
) -> HttpResult {
    let mut response = result.map_err(|e| HttpError::Transport {
        message: e.to_string(),
    })?;
    let body = response.take_body().unwrap_or_default();

    if response.header(TRANSPORT_FAILURE_HEADER).is_some() {
        return Err(
            serde_json::from_slice(&body).unwrap_or_else(|e| HttpError::InvalidResponse {
                reason: format!("unreadable transport failure: {e}"),
                request_id,
            }),
        );
    }

    let mut headers = HttpHeaders::new();
    for (name, values) in response.iter() {
        if let Err(e) = headers.insert(name.as_str(), values.last().as_str()) {
            tracing::debug!(error = %e, "response header skipped");
        }
    }

    Ok(HttpResponse::new(
        u16::from(response.status()),
        headers,
        body,
        request_id,
    ))
}

/// The response a shell resolves with when a request failed before any
/// HTTP response arrived.
pub fn transport_failure(error: &HttpError) -> ShellResponse {
    ShellResponse {
        status: TRANSPORT_FAILURE_STATUS,
        headers: vec![HttpHeader {
            name: TRANSPORT_FAILURE_HEADER.to_string(),
            value: "1".to_string(),
        }],
        body: serde_json::to_vec(error).unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} exceeds maximum of {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("request body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("connection failed to {host}: {message}")]
    ConnectionError { host: String, message: String },

    #[error("timeout while waiting for request {request_id}")]
    Timeout { request_id: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String, request_id: String },
}

impl HttpError {
    /// The request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HttpError::ConnectionError { .. }
                | HttpError::Timeout { .. }
                | HttpError::Transport { .. }
                | HttpError::InvalidResponse { .. }
        )
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            HttpError::Timeout { request_id } | HttpError::InvalidResponse { request_id, .. } => {
                Some(request_id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: HttpHeaders,
    body: Vec<u8>,
    request_id: String,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HttpHeaders, body: Vec<u8>, request_id: String) -> Self {
        Self {
            status,
            headers,
            body,
            request_id,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
            request_id: self.request_id.clone(),
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;
