//! Default Configuration Values
//!
//! All default values used throughout pixrelay live here.

use std::time::Duration;

/// HTTP client defaults
pub mod http {
    use super::*;

    /// Per-call timeout applied when a configuration does not set one.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout for the shared client.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub const USER_AGENT: &str = concat!("pixrelay/", env!("CARGO_PKG_VERSION"));
}

/// Retry and fail-over defaults
pub mod retry {
    use super::*;

    /// Base delay of the per-configuration exponential backoff.
    pub const BASE_DELAY: Duration = Duration::from_millis(1000);

    /// Retries per configuration when none is configured.
    pub const RETRY_COUNT: u32 = 2;

    /// Upper bound accepted from configuration files.
    pub const MAX_RETRY_COUNT: u32 = 10;
}

/// Model capability cache defaults
pub mod cache {
    use super::*;

    /// Lifetime of a cached model list.
    pub const MODEL_LIST_TTL: Duration = Duration::from_secs(5 * 60);
}

/// OpenAI-compatible provider defaults
pub mod openai {
    pub const BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "dall-e-3";

    /// Models reported when the model list cannot be fetched.
    pub const DEFAULT_MODELS: &[&str] = &["dall-e-3", "dall-e-2", "gpt-image-1"];
}

/// Doubao (Volcengine visual) provider defaults
pub mod doubao {
    use super::*;

    pub const BASE_URL: &str = "https://visual.volcengineapi.com";
    pub const API_VERSION: &str = "2022-08-31";
    pub const REGION: &str = "cn-north-1";
    pub const SERVICE: &str = "cv";

    /// Synchronous text-to-image model.
    pub const GENERATION_MODEL: &str = "high_aes_general_v30l_zt2i";
    /// Asynchronous image editing model.
    pub const EDIT_MODEL: &str = "seededit_v3.0";

    pub const WIDTH: u32 = 1328;
    pub const HEIGHT: u32 = 1328;
    pub const GENERATION_SCALE: f32 = 2.5;
    pub const EDIT_SCALE: f32 = 0.5;

    /// Interval between two result polls of an edit task.
    pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
    /// Number of polls before an edit task is declared timed out.
    pub const POLL_MAX_ATTEMPTS: u32 = 30;

    /// Business code of a successful call.
    pub const SUCCESS_CODE: i64 = 10000;
}
