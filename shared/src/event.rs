use serde::{Deserialize, Serialize};

use crate::capabilities::HttpResult;
use crate::model::{ImageId, ViewerTarget};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum Event {
    #[default]
    Noop,

    // Shell lifecycle
    AppStarted,
    Configure { api_base_url: String },
    HealthCheckRequested,

    // Prompt submitter
    PromptChanged { text: String },
    GenerateRequested,

    // History loader
    RefreshHistory,

    // Image deleter
    DeleteRequested { id: ImageId },

    // Fullscreen viewer
    FullscreenOpened { id: ImageId },
    FullscreenClosed,
    EscapePressed,
    ViewerClicked { target: ViewerTarget },

    ToastDismissed,

    // Capability responses
    GenerateResponse(Box<HttpResult>),
    HistoryResponse(Box<HttpResult>),
    DeleteResponse { id: ImageId, result: Box<HttpResult> },
    HealthResponse(Box<HttpResult>),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted => "app_started",
            Self::Configure { .. } => "configure",
            Self::HealthCheckRequested => "health_check_requested",
            Self::PromptChanged { .. } => "prompt_changed",
            Self::GenerateRequested => "generate_requested",
            Self::RefreshHistory => "refresh_history",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::FullscreenOpened { .. } => "fullscreen_opened",
            Self::FullscreenClosed => "fullscreen_closed",
            Self::EscapePressed => "escape_pressed",
            Self::ViewerClicked { .. } => "viewer_clicked",
            Self::ToastDismissed => "toast_dismissed",
            Self::GenerateResponse(_) => "generate_response",
            Self::HistoryResponse(_) => "history_response",
            Self::DeleteResponse { .. } => "delete_response",
            Self::HealthResponse(_) => "health_response",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::GenerateRequested
                | Self::DeleteRequested { .. }
                | Self::FullscreenOpened { .. }
                | Self::FullscreenClosed
                | Self::EscapePressed
                | Self::ViewerClicked { .. }
                | Self::RefreshHistory
        )
    }
}
