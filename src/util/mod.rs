//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Feed sources must be absolute http(s) URLs
//! - **Text processing**: HTML stripping and character-budget truncation for
//!   normalized descriptions
//!
//! # Examples
//!
//! ```
//! use feedsnap::util::{strip_html, truncate_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! let plain = strip_html("<p>Hello <em>there</em></p>");
//! let short = truncate_chars(&plain, 8);
//! ```

mod text;
mod url_validator;

pub use text::{strip_control_chars, strip_html, truncate_chars};
pub use url_validator::{validate_url, UrlValidationError};
