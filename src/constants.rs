//! Global Constants
//!
//! Pipeline limits and model defaults. Configurable values here are only the
//! defaults; `config::PipelineConfig` carries the effective settings.

/// Size limits for presenting documents to the model
pub mod limits {
    pub const MIB: u64 = 1024 * 1024;

    /// Largest combined payload sent inline with a request
    pub const INLINE_CEILING_BYTES: u64 = 20 * MIB;

    /// Most documents a planned batch may hold
    pub const MAX_DOCUMENTS_PER_BATCH: usize = 3;
}

/// Worker pool sizing
pub mod concurrency {
    /// Outer pool over top-level chunks
    pub const WORKER_COUNT: usize = 6;

    /// Documents per top-level chunk
    pub const CHUNK_SIZE: usize = 1;

    /// Inner pool over sub-batches of a split chunk
    pub const SUB_BATCH_CONCURRENCY: usize = 15;
}

/// Deadlines (seconds)
pub mod deadlines {
    /// Whole `process_documents` call
    pub const OVERALL_SECS: u64 = 20 * 60;

    /// Each sub-batch of a split chunk
    pub const BATCH_SECS: u64 = 15 * 60;

    /// Each individual generation call
    pub const CALL_SECS: u64 = 15 * 60;
}

/// Generation retry policy
pub mod retry {
    pub const MAX_ATTEMPTS: usize = 3;

    /// Fixed delay between attempts (milliseconds)
    pub const DELAY_MS: u64 = 2_000;

    /// Output budget base for retries; each retry subtracts `OUTPUT_TOKEN_STEP`
    pub const RETRY_OUTPUT_TOKEN_BASE: i32 = 4_096;

    pub const OUTPUT_TOKEN_STEP: i32 = 1_000;

    pub const MIN_OUTPUT_TOKENS: i32 = 1_000;

    /// Question cap requested on attempt 0; each retry subtracts `QUESTION_CAP_STEP`
    pub const BASE_QUESTION_CAP: usize = 50;

    pub const QUESTION_CAP_STEP: usize = 15;
}

/// Question count caps and quiz shape
pub mod quiz {
    pub const OPTIONS_PER_QUESTION: usize = 4;

    /// Per-batch cap applied before a multi-batch merge
    pub const PER_BATCH_QUESTION_CAP: usize = 40;

    pub const MULTI_BATCH_QUESTION_CAP: usize = 100;

    pub const SINGLE_CALL_QUESTION_CAP: usize = 200;

    /// Topic used when the model leaves it blank
    pub const DEFAULT_TOPIC: &str = "General";

    /// `chrono` format for synthesized titles ("Quiz Generated on March 4, 2026")
    pub const TITLE_DATE_FORMAT: &str = "%B %-d, %Y";
}

/// Gemini model defaults
pub mod model {
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

    pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

    pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

    pub const TEMPERATURE: f32 = 0.2;

    pub const TOP_K: i32 = 40;

    pub const TOP_P: f32 = 0.95;

    pub const INITIAL_MAX_OUTPUT_TOKENS: i32 = 8_192;

    /// HTTP client timeout (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 15 * 60;
}
