use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ApiConfig;
use crate::AppError;

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(ImageId);

/// A generation as the backend reports it. Read-only on the client.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub id: ImageId,
    pub prompt: String,
    pub image_url: String,
    pub created_at: String,
}

impl GeneratedImage {
    pub fn is_embedded(&self) -> bool {
        self.image_url.starts_with("data:")
    }
}

// Embedded images are multi-megabyte base64 strings; keep them out of logs.
impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GeneratedImage");
        s.field("id", &self.id).field("prompt", &self.prompt);
        if self.is_embedded() {
            s.field("image_url_bytes", &self.image_url.len());
        } else {
            s.field("image_url", &self.image_url);
        }
        s.field("created_at", &self.created_at).finish()
    }
}

/// Prompt submission state machine. At most one generate call is in flight,
/// and only while `Submitting`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub enum GenerationState {
    #[default]
    Idle,
    Submitting,
    Failed {
        error: AppError,
    },
}

impl GenerationState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Where a click inside the fullscreen viewer landed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerTarget {
    Image,
    Backdrop,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Success,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
}

impl ToastMessage {
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendStatus {
    #[default]
    Unknown,
    Checking,
    Healthy {
        timestamp: Option<String>,
    },
    Unhealthy {
        reason: String,
    },
}

/// Transient UI state. Nothing here is persisted.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Model {
    pub api: ApiConfig,

    pub prompt: String,
    pub generation: GenerationState,
    pub latest: Option<GeneratedImage>,

    pub history: Vec<GeneratedImage>,
    pub history_loaded: bool,
    pub is_refreshing: bool,

    pub fullscreen: Option<GeneratedImage>,

    pub active_toast: Option<ToastMessage>,
    pub backend_status: BackendStatus,
}

impl Model {
    pub fn is_busy(&self) -> bool {
        self.generation.is_submitting()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.generation.error().map(|e| e.message.as_str())
    }

    pub fn set_error(&mut self, error: AppError) {
        self.generation = GenerationState::Failed { error };
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    pub fn find_image(&self, id: &ImageId) -> Option<&GeneratedImage> {
        self.latest
            .iter()
            .chain(self.history.iter())
            .find(|image| &image.id == id)
    }

    /// Drops `id` from every client-visible slot. Returns whether anything
    /// was removed.
    pub fn forget_image(&mut self, id: &ImageId) -> bool {
        let before = self.history.len();
        self.history.retain(|image| &image.id != id);
        let mut removed = self.history.len() != before;

        if self.latest.as_ref().is_some_and(|image| &image.id == id) {
            self.latest = None;
            removed = true;
        }

        if self.fullscreen.as_ref().is_some_and(|image| &image.id == id) {
            self.fullscreen = None;
        }

        removed
    }
}
