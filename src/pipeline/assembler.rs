//! Quiz assembler
//!
//! Merges per-batch drafts into one quiz. Batch failures are fatal to the
//! whole merge; malformed questions are dropped one at a time.

use chrono::Local;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::constants::quiz::{
    MULTI_BATCH_QUESTION_CAP, PER_BATCH_QUESTION_CAP, SINGLE_CALL_QUESTION_CAP, TITLE_DATE_FORMAT,
};
use crate::types::{QuestionDraft, QuizDraft, QuizError, Result};

/// Question limits applied during a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCaps {
    /// Applied to each batch before concatenation
    pub per_batch: usize,
    /// Applied after shuffling
    pub total: usize,
}

impl MergeCaps {
    pub const fn new(per_batch: usize, total: usize) -> Self {
        Self { per_batch, total }
    }

    pub const fn multi_batch() -> Self {
        Self::new(PER_BATCH_QUESTION_CAP, MULTI_BATCH_QUESTION_CAP)
    }

    pub const fn single_call() -> Self {
        Self::new(SINGLE_CALL_QUESTION_CAP, SINGLE_CALL_QUESTION_CAP)
    }
}

impl Default for MergeCaps {
    fn default() -> Self {
        Self::multi_batch()
    }
}

/// Merge batch results with the thread-local RNG
pub fn merge(results: Vec<Result<QuizDraft>>, caps: MergeCaps) -> Result<QuizDraft> {
    merge_with_rng(results, caps, &mut rand::rng())
}

pub fn merge_with_rng<R: Rng + ?Sized>(
    results: Vec<Result<QuizDraft>>,
    caps: MergeCaps,
    rng: &mut R,
) -> Result<QuizDraft> {
    let mut drafts = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(draft) => drafts.push(draft),
            Err(err) => failures.push(err.to_string()),
        }
    }

    if !failures.is_empty() {
        return Err(QuizError::BatchFailures(failures));
    }

    let mut title = None;
    let mut questions = Vec::new();
    for (index, draft) in drafts.into_iter().enumerate() {
        if title.is_none() && draft.has_title() {
            title = Some(draft.title);
        }

        let mut kept = retain_well_formed(draft.questions);
        if kept.len() > caps.per_batch {
            debug!(
                batch = index,
                kept = kept.len(),
                cap = caps.per_batch,
                "Capping batch questions"
            );
            kept.truncate(caps.per_batch);
        }
        questions.extend(kept);
    }

    if questions.is_empty() {
        return Err(QuizError::NoQuestions);
    }

    questions.shuffle(rng);
    questions.truncate(caps.total);

    Ok(QuizDraft::new(title.unwrap_or_else(fallback_title), questions))
}

/// Drop questions with blank text or the wrong number of options
pub fn retain_well_formed(questions: Vec<QuestionDraft>) -> Vec<QuestionDraft> {
    questions
        .into_iter()
        .filter(|question| {
            let keep = question.is_well_formed();
            if !keep {
                warn!(
                    question = %question.text,
                    options = question.options.len(),
                    "Dropping malformed question"
                );
            }
            keep
        })
        .collect()
}

pub fn fallback_title() -> String {
    format!("Quiz Generated on {}", Local::now().format(TITLE_DATE_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::quiz::fixtures::{question, quiz};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_merge_keeps_every_question_under_caps() {
        let results = vec![Ok(quiz("A", 10, "a")), Ok(quiz("B", 12, "b"))];
        let merged = merge_with_rng(results, MergeCaps::multi_batch(), &mut seeded()).unwrap();

        assert_eq!(merged.questions.len(), 22);
        let texts: HashSet<_> = merged.questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts.len(), 22);
        assert!(texts.contains("a question 9"));
        assert!(texts.contains("b question 11"));
    }

    #[test]
    fn test_per_batch_cap_before_total_cap() {
        let results = vec![
            Ok(quiz("A", 60, "a")),
            Ok(quiz("B", 60, "b")),
            Ok(quiz("C", 60, "c")),
        ];
        let merged = merge_with_rng(results, MergeCaps::multi_batch(), &mut seeded()).unwrap();

        assert_eq!(merged.questions.len(), 100);
        // Only the first 40 of each batch are eligible
        assert!(merged.questions.iter().all(|q| {
            let n: usize = q.text.rsplit(' ').next().unwrap().parse().unwrap();
            n < 40
        }));
    }

    #[test]
    fn test_single_call_caps() {
        let merged = merge(vec![Ok(quiz("Solo", 150, "s"))], MergeCaps::single_call()).unwrap();
        assert_eq!(merged.questions.len(), 150);
        assert_eq!(merged.title, "Solo");
    }

    #[test]
    fn test_any_failure_fails_merge() {
        let results = vec![
            Ok(quiz("A", 5, "a")),
            Err(QuizError::NoQuestionsInResponse),
        ];
        let err = merge(results, MergeCaps::multi_batch()).unwrap_err();
        assert!(matches!(err, QuizError::BatchFailures(ref msgs) if msgs.len() == 1));
        assert!(err.to_string().starts_with("failed to process one or more batches: "));
    }

    #[test]
    fn test_failures_are_joined() {
        let results = vec![
            Err(QuizError::LlmApi("first".into())),
            Err(QuizError::LlmApi("second".into())),
        ];
        let err = merge(results, MergeCaps::multi_batch()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("first; "));
        assert!(message.ends_with("second"));
    }

    #[test]
    fn test_three_option_question_excluded() {
        let mut draft = quiz("A", 3, "a");
        draft.questions[1].options.pop();
        let merged = merge(vec![Ok(draft)], MergeCaps::multi_batch()).unwrap();

        assert_eq!(merged.questions.len(), 2);
        assert!(merged.questions.iter().all(|q| q.text != "a question 1"));
    }

    #[test]
    fn test_blank_text_excluded() {
        let mut draft = quiz("A", 2, "a");
        draft.questions[0].text = "   ".into();
        let merged = merge(vec![Ok(draft)], MergeCaps::multi_batch()).unwrap();
        assert_eq!(merged.questions.len(), 1);
    }

    #[test]
    fn test_correct_count_not_checked_here() {
        let mut q = question("two right", "t");
        q.options[1].is_correct = true;
        let merged = merge(
            vec![Ok(QuizDraft::new("T", vec![q]))],
            MergeCaps::multi_batch(),
        )
        .unwrap();
        assert_eq!(merged.questions[0].correct_count(), 2);
    }

    #[test]
    fn test_zero_questions_is_an_error() {
        let mut draft = quiz("A", 1, "a");
        draft.questions[0].options.clear();
        let err = merge(vec![Ok(draft), Ok(QuizDraft::default())], MergeCaps::multi_batch())
            .unwrap_err();
        assert!(matches!(err, QuizError::NoQuestions));
        assert_eq!(err.to_string(), "no questions generated from any files");
    }

    #[test]
    fn test_first_nonempty_title_wins() {
        let results = vec![
            Ok(quiz("", 1, "a")),
            Ok(quiz("Second", 1, "b")),
            Ok(quiz("Third", 1, "c")),
        ];
        let merged = merge(results, MergeCaps::multi_batch()).unwrap();
        assert_eq!(merged.title, "Second");
    }

    #[test]
    fn test_fallback_title_uses_date() {
        let merged = merge(vec![Ok(quiz("", 1, "a"))], MergeCaps::multi_batch()).unwrap();
        assert!(merged.title.starts_with("Quiz Generated on "));
        assert_eq!(merged.title, fallback_title());
    }

    #[test]
    fn test_shuffle_interleaves_batches() {
        let results = vec![Ok(quiz("A", 20, "a")), Ok(quiz("B", 20, "b"))];
        let merged = merge_with_rng(results, MergeCaps::multi_batch(), &mut seeded()).unwrap();
        let first_half_from_a = merged.questions[..20]
            .iter()
            .filter(|q| q.text.starts_with("a "))
            .count();
        assert!(first_half_from_a < 20);
    }
}
