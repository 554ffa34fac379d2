//! QuizForge - Document-to-Quiz Generation
//!
//! Turns documents and transcripts into multiple-choice quizzes with a
//! generative model, then stores them relationally.
//!
//! ## Core Features
//!
//! - **Size-Aware Routing**: inline bytes, uploaded file references, or
//!   planned sub-batches depending on payload size
//! - **Retry with Throttling**: shrinking output budgets and question caps
//!   on each retry
//! - **JSON Repair**: recovery of fenced, prose-wrapped and truncated output
//! - **Two-Tier Worker Pools**: chunks fan out to workers, oversized chunks
//!   fan out again to a sub-pool
//! - **Usage Metering**: token counts reported even when generation fails
//!
//! ## Quick Start
//!
//! ```ignore
//! use quizforge::{ConfigLoader, QuizPipeline, SourceDocument, create_model};
//!
//! let config = ConfigLoader::load()?;
//! let pipeline = QuizPipeline::from_config(create_model(&config.llm)?, &config);
//! let metered = pipeline
//!     .process_documents(vec![SourceDocument::from_path("lecture.pdf").await?])
//!     .await;
//! let quiz = metered.result?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: model backend, prompt, JSON extraction, metering, deadlines
//! - [`pipeline`]: planner, generator, assembler, worker pool, orchestrator
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`services`]: authentication, transcripts, notifications, quiz flow
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};

pub use types::error::{ErrorCategory, QuizError, Result, ResultExt};
pub use types::{OptionDraft, QuestionDraft, QuizDraft, SourceDocument, TokenUsage, UserId};

pub use storage::{Database, QuizStore, SharedDatabase, SqliteQuizStore, persist_quiz};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{Metered, QuizPipeline, WorkerPool, merge, plan};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{GenerativeModel, SharedModel, UsageMeter, create_model, extract_json};
