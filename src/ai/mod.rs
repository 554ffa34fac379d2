//! AI Integration Layer
//!
//! Generative model backends, the quiz prompt, response extraction, usage
//! metering and deadline helpers.

pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use metrics::{SharedMeter, UsageMeter};
pub use prompt::{QUIZ_PROMPT, prompt_for_attempt, question_cap};
pub use provider::{
    Candidate, FileHandle, GeminiModel, GenerativeModel, ModelResponse, Part, SamplingConfig,
    SharedModel, create_model,
};
pub use timeout::{Deadlines, with_timeout};
pub use validation::{JsonExtractor, decode_quiz, extract_json};
