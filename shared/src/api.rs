//! Backend client: request construction and response decoding for the
//! image service. Nothing here performs I/O; requests are handed to the shell
//! through the HTTP capability and the results come back through the parsers.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::capabilities::{HttpError, HttpRequest, HttpResponse, HttpResult, ValidatedUrl};
use crate::model::{GeneratedImage, ImageId};
use crate::{AppError, AppResult, ErrorKind, FALLBACK_ERROR_MESSAGE};

/// Development address of the image service.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8001";

/// Number of prior generations shown in the history strip.
pub const HISTORY_PAGE_SIZE: usize = 6;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, HttpError> {
        let validated = ValidatedUrl::new(base_url)?;
        Ok(Self {
            base_url: validated.as_str().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_images(&self, limit: usize) -> Result<HttpRequest, HttpError> {
        let mut url = self.endpoint(&["api", "images"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        HttpRequest::get(url.as_str())?.with_header("Accept", "application/json")
    }

    pub fn generate_image(&self, prompt: &str) -> Result<HttpRequest, HttpError> {
        let url = self.endpoint(&["api", "generate-image"])?;
        HttpRequest::post(url.as_str())?
            .with_header("Accept", "application/json")?
            .with_json(&GenerateImageBody { prompt })
    }

    /// Ids that would collapse into another path (empty, `.` or `..`) are
    /// refused rather than sent to a different resource.
    pub fn delete_image(&self, id: &ImageId) -> Result<HttpRequest, HttpError> {
        if matches!(id.as_str().trim(), "" | "." | "..") {
            return Err(HttpError::InvalidRequest {
                reason: format!("'{id}' is not a deletable image id"),
            });
        }
        let url = self.endpoint(&["api", "images", id.as_str()])?;
        HttpRequest::delete(url.as_str())
    }

    pub fn health(&self) -> Result<HttpRequest, HttpError> {
        let url = self.endpoint(&["api", "health"])?;
        HttpRequest::get(url.as_str())?.with_header("Accept", "application/json")
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HttpError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| HttpError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| HttpError::InvalidUrl {
                url: self.base_url.clone(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[derive(Serialize)]
struct GenerateImageBody<'a> {
    prompt: &'a str,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Any failure to fetch the list, including a non-2xx status, is a
/// network error; the status and backend detail are kept on the error.
pub fn parse_image_list(result: &HttpResult) -> AppResult<Vec<GeneratedImage>> {
    let response = expect_success(result).map_err(|e| AppError {
        kind: ErrorKind::Network,
        ..e
    })?;
    decode(response)
}

pub fn parse_generated_image(result: &HttpResult) -> AppResult<GeneratedImage> {
    let response = expect_success(result)?;
    decode(response)
}

/// Any 2xx counts; the confirmation body is not inspected.
pub fn parse_delete(result: &HttpResult) -> AppResult<()> {
    expect_success(result).map(|_| ())
}

pub fn parse_health(result: &HttpResult) -> AppResult<HealthStatus> {
    let response = expect_success(result)?;
    decode(response)
}

fn expect_success(result: &HttpResult) -> AppResult<&HttpResponse> {
    match result {
        Ok(response) if response.is_success() => {
            debug!(
                request_id = response.request_id(),
                status = response.status(),
                "backend request succeeded"
            );
            Ok(response)
        }
        Ok(response) => Err(AppError::from_http_status(
            response.status(),
            Some(response.body()),
        )
        .with_context("request_id", response.request_id())),
        Err(e) => Err(AppError::from(e)),
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> AppResult<T> {
    response.json().map_err(|e| {
        AppError::new(ErrorKind::Deserialization, FALLBACK_ERROR_MESSAGE)
            .with_internal(e.to_string())
            .with_context("request_id", response.request_id())
    })
}
