//! Deadline handling
//!
//! Two nested deadlines bound a pipeline run: the whole call and each
//! batch or sub-batch. The per-call timeout belongs to the generator.
//! Elapsed deadlines drop the wrapped future, which cancels its in-flight
//! network operations.

use std::future::Future;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::constants::deadlines;
use crate::types::{QuizError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub overall: Duration,
    pub batch: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            overall: Duration::from_secs(deadlines::OVERALL_SECS),
            batch: Duration::from_secs(deadlines::BATCH_SECS),
        }
    }
}

impl From<&PipelineConfig> for Deadlines {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            overall: config.overall_deadline(),
            batch: config.batch_deadline(),
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns [`QuizError::Timeout`] if the operation does not finish in time.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(QuizError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deadlines() {
        let d = Deadlines::default();
        assert_eq!(d.overall.as_secs(), 1200);
        assert_eq!(d.batch.as_secs(), 900);
        assert!(d.batch <= d.overall);
    }

    #[test]
    fn test_deadlines_from_config() {
        let config = PipelineConfig {
            overall_deadline_secs: 60,
            batch_deadline_secs: 30,
            call_timeout_secs: 10,
            ..PipelineConfig::default()
        };
        let d = Deadlines::from(&config);
        assert_eq!(d.overall, Duration::from_secs(60));
        assert_eq!(d.batch, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let value = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, QuizError>(7) },
            "quick",
        )
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, QuizError>(7)
            },
            "slow generation",
        )
        .await;
        assert!(matches!(
            result,
            Err(QuizError::Timeout { ref operation, .. }) if operation == "slow generation"
        ));
    }
}
