//! Utility functions shared by the ingest pipeline and the CLI.
//!
//! - **URL validation**: scheme and host checks before a feed is fetched
//! - **Text processing**: HTML-to-text for content snippets, terminal-safe
//!   width-aware truncation

mod text;
mod url_validator;

pub use text::{display_width, fit_to_width, strip_control_chars, strip_html, truncate_to_width};
pub use url_validator::{validate_url, HostPolicy, UrlValidationError};
