//! Model response validation
//!
//! Extraction and strict decoding of the quiz payload. Question-level
//! structural checks live with the assembler.

mod json_repair;

pub use json_repair::{JsonExtractor, decode_quiz, extract_json};
