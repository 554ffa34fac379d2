//! Concurrency orchestrator
//!
//! Fans documents out over a worker pool in fixed-size chunks, routes each
//! chunk (inline, remote reference, or split into sub-batches on a second
//! pool), and fans the results back in through the assembler. Token usage
//! is metered across every worker and reported even when the run fails.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::ai::metrics::{SharedMeter, UsageMeter};
use crate::ai::provider::SharedModel;
use crate::ai::timeout::{Deadlines, with_timeout};
use crate::config::Config;
use crate::constants::concurrency;
use crate::types::document::describe;
use crate::types::{QuizDraft, QuizError, Result, SourceDocument};

use super::Metered;
use super::assembler::{MergeCaps, merge};
use super::generator::{GenerationMode, GeneratorSettings, QuizGenerator};
use super::planner::{Batch, plan};
use super::pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Planning,
    Dispatched,
    Collecting,
    Merged,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planning => "planning",
            Self::Dispatched => "dispatched",
            Self::Collecting => "collecting",
            Self::Merged => "merged",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub worker_count: usize,
    /// Documents per top-level chunk
    pub chunk_size: usize,
    pub sub_batch_concurrency: usize,
    pub deadlines: Deadlines,
    pub multi_batch_caps: MergeCaps,
    pub single_call_caps: MergeCaps,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            worker_count: concurrency::WORKER_COUNT,
            chunk_size: concurrency::CHUNK_SIZE,
            sub_batch_concurrency: concurrency::SUB_BATCH_CONCURRENCY,
            deadlines: Deadlines::default(),
            multi_batch_caps: MergeCaps::multi_batch(),
            single_call_caps: MergeCaps::single_call(),
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        let pipeline = &config.pipeline;
        Self {
            worker_count: pipeline.worker_count,
            chunk_size: pipeline.chunk_size,
            sub_batch_concurrency: pipeline.sub_batch_concurrency,
            deadlines: Deadlines::from(pipeline),
            multi_batch_caps: MergeCaps::new(
                pipeline.per_batch_question_cap,
                pipeline.multi_batch_question_cap,
            ),
            single_call_caps: MergeCaps::new(
                pipeline.single_call_question_cap,
                pipeline.single_call_question_cap,
            ),
        }
    }
}

// =============================================================================
// QuizPipeline
// =============================================================================

pub struct QuizPipeline {
    generator: Arc<QuizGenerator>,
    settings: OrchestratorSettings,
}

impl QuizPipeline {
    pub fn new(
        model: SharedModel,
        generator_settings: GeneratorSettings,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            generator: Arc::new(QuizGenerator::new(model, generator_settings)),
            settings,
        }
    }

    pub fn from_config(model: SharedModel, config: &Config) -> Self {
        Self::new(
            model,
            GeneratorSettings::from(config),
            OrchestratorSettings::from(config),
        )
    }

    /// Turn documents into one quiz, bounded by the overall deadline.
    ///
    /// Usage covers every billed attempt, including those of failed batches
    /// and of calls interrupted by a deadline after their response arrived.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn process_documents(&self, documents: Vec<SourceDocument>) -> Metered<QuizDraft> {
        let meter = UsageMeter::shared();
        let result = with_timeout(
            self.settings.deadlines.overall,
            self.run(documents, &meter),
            "process documents",
        )
        .await;

        let usage = meter.snapshot();
        info!(
            calls = meter.calls(),
            prompt_tokens = usage.prompt_tokens,
            candidate_tokens = usage.candidate_tokens,
            total_tokens = usage.total_tokens,
            "Pipeline token usage"
        );

        match &result {
            Ok(quiz) => {
                debug!(state = %PipelineState::Merged, questions = quiz.questions.len());
            }
            Err(err) => {
                debug!(state = %PipelineState::Failed);
                error!(error = %err, "Quiz generation failed");
            }
        }

        Metered { result, usage }
    }

    async fn run(&self, documents: Vec<SourceDocument>, meter: &SharedMeter) -> Result<QuizDraft> {
        if documents.is_empty() {
            return Err(QuizError::NoDocuments);
        }

        debug!(state = %PipelineState::Planning);
        let chunks: Vec<Vec<SourceDocument>> = documents
            .chunks(self.settings.chunk_size.max(1))
            .map(<[SourceDocument]>::to_vec)
            .collect();
        let labels: Vec<String> = chunks.iter().map(|chunk| describe(chunk)).collect();

        debug!(state = %PipelineState::Dispatched, chunks = chunks.len());
        let processor = ChunkProcessor {
            generator: Arc::clone(&self.generator),
            meter: Arc::clone(meter),
            sub_pool: WorkerPool::new(self.settings.sub_batch_concurrency),
            batch_deadline: self.settings.deadlines.batch,
            sub_batch_caps: self.settings.multi_batch_caps,
        };
        let outputs = WorkerPool::new(self.settings.worker_count)
            .run(chunks, move |chunk| {
                let processor = processor.clone();
                async move { processor.process(chunk).await }
            })
            .await;

        debug!(state = %PipelineState::Collecting, results = outputs.len());
        let caps = if outputs.len() == 1 {
            self.settings.single_call_caps
        } else {
            self.settings.multi_batch_caps
        };
        merge(collect_results(outputs, &labels), caps)
    }
}

/// Pair pool outputs with their chunk labels, wrapping failures
fn collect_results(outputs: Vec<Option<Result<QuizDraft>>>, labels: &[String]) -> Vec<Result<QuizDraft>> {
    outputs
        .into_iter()
        .enumerate()
        .map(|(i, output)| {
            let index = i + 1;
            match output {
                Some(Ok(quiz)) => Ok(quiz),
                Some(Err(err)) => Err(QuizError::Batch {
                    index,
                    documents: labels.get(i).cloned().unwrap_or_default(),
                    source: Box::new(err),
                }),
                None => Err(QuizError::WorkerLost(index)),
            }
        })
        .collect()
}

// =============================================================================
// Chunk Processing
// =============================================================================

/// Per-worker handle onto the shared generator and meter
#[derive(Clone)]
struct ChunkProcessor {
    generator: Arc<QuizGenerator>,
    meter: SharedMeter,
    sub_pool: WorkerPool,
    batch_deadline: Duration,
    sub_batch_caps: MergeCaps,
}

impl ChunkProcessor {
    async fn process(&self, chunk: Vec<SourceDocument>) -> Result<QuizDraft> {
        let ceiling = self.generator.settings().inline_ceiling;
        let mode = GenerationMode::select(&chunk, ceiling);
        debug!(%mode, documents = %describe(&chunk), "Routing chunk");

        match mode {
            GenerationMode::Split => self.process_split(&chunk, ceiling).await,
            GenerationMode::Inline | GenerationMode::RemoteReference => {
                with_timeout(
                    self.batch_deadline,
                    self.generator.generate_documents(&chunk, &self.meter),
                    "generate batch",
                )
                .await
            }
        }
    }

    /// Plan the chunk into quarter-ceiling sub-batches and generate each
    /// independently on the sub-pool
    async fn process_split(&self, chunk: &[SourceDocument], ceiling: u64) -> Result<QuizDraft> {
        let batches = plan(chunk, ceiling / 4);
        let labels: Vec<String> = batches.iter().map(Batch::describe).collect();
        info!(
            documents = chunk.len(),
            sub_batches = batches.len(),
            "Processing documents individually"
        );

        let generator = Arc::clone(&self.generator);
        let meter = Arc::clone(&self.meter);
        let deadline = self.batch_deadline;
        let outputs = self
            .sub_pool
            .run(batches, move |batch: Batch| {
                let generator = Arc::clone(&generator);
                let meter = Arc::clone(&meter);
                async move {
                    with_timeout(
                        deadline,
                        generator.generate_documents(batch.documents(), &meter),
                        "generate sub-batch",
                    )
                    .await
                }
            })
            .await;

        merge(collect_results(outputs, &labels), self.sub_batch_caps)
    }
}
