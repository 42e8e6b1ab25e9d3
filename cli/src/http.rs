//! Executes the core's `crux_http` effects with `reqwest`.

use std::time::Instant;

use crux_http::protocol::{HttpHeader, HttpRequest, HttpResponse};
use imagegen_shared::capabilities::{transport_failure, HttpError, REQUEST_ID_HEADER};
use tracing::{debug, warn};

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("imagegen/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Runs one request. A failure without an HTTP response is encoded with
/// [`transport_failure`] so the core can tell it apart from a backend error.
pub async fn execute(client: &reqwest::Client, request: &HttpRequest) -> HttpResponse {
    match send(client, request).await {
        Ok(response) => response,
        Err(error) => transport_failure(&error),
    }
}

async fn send(client: &reqwest::Client, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
    let started = Instant::now();
    let request_id = request_id(request);

    let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
        HttpError::InvalidRequest {
            reason: format!("method '{}': {e}", request.method),
        }
    })?;

    let mut builder = client.request(method, request.url.as_str());
    for header in &request.headers {
        builder = builder.header(header.name.as_str(), header.value.as_str());
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }

    debug!(request_id, method = %request.method, url = %request.url, "sending request");

    let response = builder
        .send()
        .await
        .map_err(|e| transport_error(&e, request))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            Some(HttpHeader {
                name: name.as_str().to_string(),
                value: value.to_str().ok()?.to_string(),
            })
        })
        .collect();

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(&e, request))?
        .to_vec();

    debug!(
        request_id,
        status,
        bytes = body.len(),
        duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "response received"
    );

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn request_id(request: &HttpRequest) -> &str {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(REQUEST_ID_HEADER))
        .map_or("", |h| h.value.as_str())
}

fn transport_error(e: &reqwest::Error, request: &HttpRequest) -> HttpError {
    let request_id = request_id(request);
    warn!(request_id, error = %e, "request failed");

    if e.is_timeout() {
        HttpError::Timeout {
            request_id: request_id.to_string(),
        }
    } else if e.is_connect() {
        HttpError::ConnectionError {
            host: reqwest::Url::parse(&request.url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_default(),
            message: e.to_string(),
        }
    } else {
        HttpError::Transport {
            message: e.to_string(),
        }
    }
}
