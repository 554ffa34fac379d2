//! Token usage metering
//!
//! Thread-safe accumulator shared by every worker of a pipeline run. Usage is
//! recorded the moment a response arrives, before its content is validated,
//! so billed tokens survive failed attempts and deadline cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::types::TokenUsage;

#[derive(Debug, Default)]
pub struct UsageMeter {
    calls: AtomicU32,
    prompt_tokens: AtomicI64,
    candidate_tokens: AtomicI64,
    total_tokens: AtomicI64,
}

pub type SharedMeter = Arc<UsageMeter>;

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedMeter {
        Arc::new(Self::new())
    }

    /// Record one model response's usage metadata
    pub fn record(&self, usage: &TokenUsage) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(i64::from(usage.prompt_tokens), Ordering::Relaxed);
        self.candidate_tokens
            .fetch_add(i64::from(usage.candidate_tokens), Ordering::Relaxed);
        self.total_tokens
            .fetch_add(i64::from(usage.total_tokens), Ordering::Relaxed);
    }

    /// Number of responses that carried usage metadata
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Current totals, clamped to the i32 counters models report
    pub fn snapshot(&self) -> TokenUsage {
        let clamp = |v: &AtomicI64| {
            i32::try_from(v.load(Ordering::Relaxed)).unwrap_or(i32::MAX)
        };
        TokenUsage {
            prompt_tokens: clamp(&self.prompt_tokens),
            candidate_tokens: clamp(&self.candidate_tokens),
            total_tokens: clamp(&self.total_tokens),
        }
    }
}
