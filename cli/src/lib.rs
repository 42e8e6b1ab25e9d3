//! Command-line shell for the image generation core.

pub mod export;
pub mod http;
pub mod shell;

pub use shell::Shell;
