// lib.rs - headless core of the image generation client

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod capabilities;
pub mod event;
pub mod model;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{
    BackendStatus, GeneratedImage, GenerationState, ImageId, Model, ToastKind, ToastMessage,
    ViewerTarget,
};

use capabilities::HttpError;

pub const PROMPT_REQUIRED_MESSAGE: &str = "Please enter a prompt";
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to generate image. Please try again.";
pub const IMAGE_GENERATED_TOAST: &str = "Image generated";
pub const IMAGE_DELETED_TOAST: &str = "Image deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Rejected before reaching the network, or reported invalid by the backend.
    Validation,
    /// Non-2xx response.
    Backend,
    /// No HTTP response at all.
    Network,
    /// 2xx response whose body is not what we expected.
    Deserialization,
    /// The request could not be built.
    InvalidRequest,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Backend => "BACKEND_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

/// An error as the app sees it. `message` is always fit to show the user;
/// anything diagnostic goes in `internal_message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub status: Option<u16>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            status: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Maps a non-2xx response. The backend's `detail` becomes the message
    /// when it has one; 422 is the backend's request validation failure.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let kind = match status {
            422 => ErrorKind::Validation,
            _ => ErrorKind::Backend,
        };

        let detail = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .and_then(|e| e.detail)
            .and_then(|d| detail_message(&d));

        let error = match detail {
            Some(message) => Self::new(kind, message),
            None => Self::new(kind, FALLBACK_ERROR_MESSAGE)
                .with_internal(format!("HTTP error: {status}")),
        };

        error.with_status(status)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<&HttpError> for AppError {
    fn from(e: &HttpError) -> Self {
        let kind = if e.is_transport() {
            ErrorKind::Network
        } else {
            ErrorKind::InvalidRequest
        };
        let error = AppError::new(kind, FALLBACK_ERROR_MESSAGE).with_internal(e.to_string());
        match e.request_id() {
            Some(id) => error.with_context("request_id", id),
            None => error,
        }
    }
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        Self::from(&e)
    }
}

/// FastAPI error body: `detail` is a string for `HTTPException`s and a list
/// of `{loc, msg, type}` entries for request validation failures.
#[derive(Debug, Clone, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

fn detail_message(detail: &serde_json::Value) -> Option<String> {
    match detail {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Renders an ISO-8601 timestamp for display. Unparseable input is shown as is.
#[must_use]
pub fn format_created_at(created_at: &str) -> String {
    use chrono::{DateTime, NaiveDateTime, Utc};

    if let Ok(dt) = DateTime::parse_from_rfc3339(created_at) {
        return dt.with_timezone(&Utc).format("%b %-d, %Y %H:%M UTC").to_string();
    }

    // Naive timestamps from the backend are UTC.
    NaiveDateTime::parse_from_str(created_at, "%Y-%m-%dT%H:%M:%S%.f").map_or_else(
        |_| created_at.to_string(),
        |naive| naive.format("%b %-d, %Y %H:%M UTC").to_string(),
    )
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageCard {
    pub id: String,
    pub prompt: String,
    pub image_url: String,
    pub created_at: String,
    pub created_label: String,
    pub is_embedded: bool,
}

impl From<&GeneratedImage> for ImageCard {
    fn from(image: &GeneratedImage) -> Self {
        Self {
            id: image.id.0.clone(),
            prompt: image.prompt.clone(),
            image_url: image.image_url.clone(),
            created_at: image.created_at.clone(),
            created_label: format_created_at(&image.created_at),
            is_embedded: image.is_embedded(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.message.clone(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub api_base_url: String,
    pub prompt: String,
    pub is_generating: bool,
    pub can_submit: bool,
    pub error: Option<UserFacingError>,
    pub latest: Option<ImageCard>,
    pub history: Vec<ImageCard>,
    pub history_loaded: bool,
    pub is_refreshing: bool,
    pub fullscreen: Option<ImageCard>,
    pub toast: Option<ToastMessage>,
    pub backend_status: BackendStatus,
}

pub mod app {
    use crux_core::App as _;
    use tracing::{debug, error, info, warn};

    use super::*;
    use crate::api::{self, ApiConfig, HISTORY_PAGE_SIZE};
    use crate::capabilities::{Capabilities, HttpResult};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn submit_prompt(model: &mut Model, caps: &Capabilities) {
            if model.is_busy() {
                debug!("generation already in flight; ignoring submit");
                return;
            }

            let prompt = model.prompt.trim().to_string();
            if prompt.is_empty() {
                model.set_error(AppError::new(ErrorKind::Validation, PROMPT_REQUIRED_MESSAGE));
                caps.render.render();
                return;
            }

            let request = match model.api.generate_image(&prompt) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "could not build generate request");
                    model.set_error(AppError::from(&e));
                    caps.render.render();
                    return;
                }
            };

            model.latest = None;
            model.generation = GenerationState::Submitting;

            info!(
                request_id = request.request_id(),
                prompt_chars = prompt.chars().count(),
                "submitting prompt"
            );
            request.send(&caps.http, |result| Event::GenerateResponse(Box::new(result)));
            caps.render.render();
        }

        fn handle_generate_response(
            &self,
            result: &HttpResult,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            if !model.is_busy() {
                warn!("generate response arrived with no submission in flight; ignoring");
                return;
            }

            match api::parse_generated_image(result) {
                Ok(image) => {
                    info!(image_id = %image.id, "image generated");
                    model.latest = Some(image);
                    model.prompt.clear();
                    model.generation = GenerationState::Idle;
                    model.show_toast(IMAGE_GENERATED_TOAST, ToastKind::Success);
                    self.update(Event::RefreshHistory, model, caps);
                }
                Err(e) => {
                    warn!(code = e.code(), error = %e, "image generation failed");
                    model.set_error(e);
                }
            }

            caps.render.render();
        }

        fn send_refresh_request(model: &mut Model, caps: &Capabilities) {
            let request = match model.api.list_images(HISTORY_PAGE_SIZE) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "could not build history request");
                    return;
                }
            };

            model.is_refreshing = true;
            request.send(&caps.http, |result| Event::HistoryResponse(Box::new(result)));
            caps.render.render();
        }

        fn handle_history_response(result: &HttpResult, model: &mut Model, caps: &Capabilities) {
            model.is_refreshing = false;

            match api::parse_image_list(result) {
                Ok(images) => {
                    debug!(count = images.len(), "history refreshed");
                    model.history = images;
                    model.history_loaded = true;
                }
                Err(e) => {
                    warn!(code = e.code(), error = %e, "history refresh failed; keeping current list");
                }
            }

            caps.render.render();
        }

        fn send_delete_request(id: ImageId, model: &Model, caps: &Capabilities) {
            let request = match model.api.delete_image(&id) {
                Ok(request) => request,
                Err(e) => {
                    error!(image_id = %id, error = %e, "could not build delete request");
                    return;
                }
            };

            request.send(&caps.http, move |result| Event::DeleteResponse {
                id,
                result: Box::new(result),
            });
        }

        fn handle_delete_response(
            &self,
            id: &ImageId,
            result: &HttpResult,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            match api::parse_delete(result) {
                Ok(()) => {
                    let removed = model.forget_image(id);
                    info!(image_id = %id, removed, "image deleted");
                    model.show_toast(IMAGE_DELETED_TOAST, ToastKind::Success);
                    self.update(Event::RefreshHistory, model, caps);
                    caps.render.render();
                }
                Err(e) => {
                    warn!(image_id = %id, code = e.code(), error = %e, "delete failed; state unchanged");
                }
            }
        }

        fn configure(api_base_url: &str, model: &mut Model) {
            match ApiConfig::new(api_base_url) {
                Ok(config) => {
                    info!(base_url = config.base_url(), "api configured");
                    model.api = config;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        current = model.api.base_url(),
                        "rejected api base url; keeping current configuration"
                    );
                }
            }
        }

        fn send_health_check(model: &mut Model, caps: &Capabilities) {
            match model.api.health() {
                Ok(request) => {
                    model.backend_status = BackendStatus::Checking;
                    request.send(&caps.http, |result| Event::HealthResponse(Box::new(result)));
                }
                Err(e) => {
                    model.backend_status = BackendStatus::Unhealthy {
                        reason: e.to_string(),
                    };
                }
            }
        }

        fn handle_health_response(result: &HttpResult, model: &mut Model) {
            model.backend_status = match api::parse_health(result) {
                Ok(health) if health.is_healthy() => BackendStatus::Healthy {
                    timestamp: health.timestamp,
                },
                Ok(health) => BackendStatus::Unhealthy {
                    reason: format!("backend reported status '{}'", health.status),
                },
                Err(e) => {
                    warn!(code = e.code(), error = %e, "health check failed");
                    BackendStatus::Unhealthy {
                        reason: e.internal_message.unwrap_or(e.message),
                    }
                }
            };
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(
                event = event.name(),
                user_initiated = event.is_user_initiated(),
                "update"
            );

            match event {
                Event::Noop => {}

                Event::AppStarted => {
                    self.update(Event::RefreshHistory, model, caps);
                }

                Event::Configure { api_base_url } => {
                    Self::configure(&api_base_url, model);
                    caps.render.render();
                }

                Event::HealthCheckRequested => {
                    Self::send_health_check(model, caps);
                    caps.render.render();
                }

                Event::HealthResponse(result) => {
                    Self::handle_health_response(&result, model);
                    caps.render.render();
                }

                Event::PromptChanged { text } => {
                    model.prompt = text;
                    caps.render.render();
                }

                Event::GenerateRequested => {
                    Self::submit_prompt(model, caps);
                }

                Event::GenerateResponse(result) => {
                    self.handle_generate_response(&result, model, caps);
                }

                Event::RefreshHistory => {
                    Self::send_refresh_request(model, caps);
                }

                Event::HistoryResponse(result) => {
                    Self::handle_history_response(&result, model, caps);
                }

                Event::DeleteRequested { id } => {
                    Self::send_delete_request(id, model, caps);
                }

                Event::DeleteResponse { id, result } => {
                    self.handle_delete_response(&id, &result, model, caps);
                }

                Event::FullscreenOpened { id } => match model.find_image(&id).cloned() {
                    Some(image) => {
                        model.fullscreen = Some(image);
                        caps.render.render();
                    }
                    None => debug!(image_id = %id, "cannot open unknown image"),
                },

                Event::FullscreenClosed | Event::EscapePressed => {
                    if model.fullscreen.take().is_some() {
                        caps.render.render();
                    }
                }

                Event::ViewerClicked { target } => match target {
                    ViewerTarget::Backdrop => {
                        self.update(Event::FullscreenClosed, model, caps);
                    }
                    ViewerTarget::Image => {}
                },

                Event::ToastDismissed => {
                    model.clear_toast();
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            ViewModel {
                api_base_url: model.api.base_url().to_string(),
                prompt: model.prompt.clone(),
                is_generating: model.is_busy(),
                can_submit: !model.is_busy() && !model.prompt.trim().is_empty(),
                error: model.generation.error().map(UserFacingError::from),
                latest: model.latest.as_ref().map(ImageCard::from),
                history: model.history.iter().map(ImageCard::from).collect(),
                history_loaded: model.history_loaded,
                is_refreshing: model.is_refreshing,
                fullscreen: model.fullscreen.as_ref().map(ImageCard::from),
                toast: model.active_toast.clone(),
                backend_status: model.backend_status.clone(),
            }
        }
    }
}
