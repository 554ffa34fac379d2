//! Document-to-quiz generation pipeline
//!
//! - `planner`: size-bounded batching
//! - `generator`: model calls with retry and output throttling
//! - `assembler`: validation and merging of batch results
//! - `pool`: bounded worker pool
//! - `orchestrator`: fan-out/fan-in over chunks and sub-batches

pub mod assembler;
pub mod generator;
pub mod orchestrator;
pub mod planner;
pub mod pool;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{MergeCaps, merge};
pub use generator::{GenerationMode, GeneratorSettings, QuizGenerator};
pub use orchestrator::{OrchestratorSettings, PipelineState, QuizPipeline};
pub use planner::{Batch, plan};
pub use pool::WorkerPool;

use crate::types::{Result, TokenUsage};

/// A result together with the tokens spent producing it
#[derive(Debug)]
pub struct Metered<T> {
    pub result: Result<T>,
    pub usage: TokenUsage,
}

impl<T> Metered<T> {
    pub fn into_parts(self) -> (Result<T>, TokenUsage) {
        (self.result, self.usage)
    }
}
