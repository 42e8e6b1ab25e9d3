//! Effects the core can ask a shell to perform.
//!
//! We use Crux's built-in Render capability directly because it provides
//! all necessary functionality for triggering view updates. HTTP goes through
//! `crux_http`, wrapped by validated request types.

mod http;

pub use self::http::{
    transport_failure, HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResult,
    ValidatedUrl, REQUEST_ID_HEADER, TRANSPORT_FAILURE_HEADER,
};
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
use crate::App;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
