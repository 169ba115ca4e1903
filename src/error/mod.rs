//! Error Handling Module
//!
//! - Core error types (`RelayError`, `ErrorCategory`)
//! - HTTP failure classification shared by all adapters
//! - User-facing fail-over summaries
//!
//! # Example
//!
//! ```rust,ignore
//! use pixrelay::error::{RelayError, ErrorCategory};
//!
//! let error = RelayError::api_error(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert_eq!(error.status_code(), Some(404));
//! ```

pub mod helpers;
pub mod types;

pub use helpers::*;
pub use types::*;
