//! Doubao business error codes.
//!
//! Any code other than [`defaults::doubao::SUCCESS_CODE`] is an error. Known
//! codes carry a user-facing message and a retry hint; unknown codes keep the
//! server message and are assumed transient.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::defaults;
use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeInfo {
    pub message: &'static str,
    pub retryable: bool,
}

static CODE_TABLE: Lazy<HashMap<i64, CodeInfo>> = Lazy::new(|| {
    let entries: [(i64, &'static str, bool); 10] = [
        (50400, "access denied, check the access key permissions", false),
        (50411, "input image rejected by content moderation", false),
        (50412, "input text rejected by content moderation", false),
        (50413, "input text contains sensitive or copyrighted content", false),
        (50511, "generated image rejected by content moderation", false),
        (50512, "generated text rejected by content moderation", false),
        (50429, "request rate limit reached, try again later", true),
        (50430, "concurrency limit reached, try again later", true),
        (50500, "provider internal error", true),
        (50501, "provider internal RPC error", true),
    ];
    entries
        .into_iter()
        .map(|(code, message, retryable)| (code, CodeInfo { message, retryable }))
        .collect()
});

pub fn lookup(code: i64) -> Option<&'static CodeInfo> {
    CODE_TABLE.get(&code)
}

pub const fn is_success(code: i64) -> bool {
    code == defaults::doubao::SUCCESS_CODE
}

/// Error for a non-success business code.
pub fn decode_error(code: i64, server_message: &str) -> RelayError {
    let (message, retryable) = match lookup(code) {
        Some(info) => (info.message.to_string(), info.retryable),
        None if server_message.trim().is_empty() => ("unknown error".to_string(), true),
        None => (server_message.to_string(), true),
    };
    RelayError::ProviderError {
        provider: "doubao".to_string(),
        code,
        message,
        retryable,
    }
}
