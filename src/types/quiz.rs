//! Quiz data model
//!
//! Drafts are the in-memory, unpersisted output of generation. They double as
//! the strict wire format the model is asked to produce, so unknown fields are
//! rejected during decoding.

use serde::{Deserialize, Deserializer, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::constants::quiz::OPTIONS_PER_QUESTION;

// =============================================================================
// Drafts
// =============================================================================

/// A generated quiz prior to storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuizDraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<QuestionDraft>,
}

impl QuizDraft {
    pub fn new(title: impl Into<String>, questions: Vec<QuestionDraft>) -> Self {
        Self {
            title: title.into(),
            questions,
        }
    }

    /// Keep at most `cap` questions in their current order
    pub fn truncate(&mut self, cap: usize) {
        self.questions.truncate(cap);
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionDraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<OptionDraft>,
}

impl QuestionDraft {
    /// Non-empty text and exactly four options
    pub fn is_well_formed(&self) -> bool {
        !self.text.trim().is_empty() && self.options.len() == OPTIONS_PER_QUESTION
    }

    pub fn correct_count(&self) -> usize {
        self.options.iter().filter(|o| o.is_correct).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_correct: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
}

/// Explicit `null` decodes like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Token Usage
// =============================================================================

/// Billing counters reported by the model, additive across attempts and batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i32,
    pub candidate_tokens: i32,
    pub total_tokens: i32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: i32, candidate_tokens: i32, total_tokens: i32) -> Self {
        Self {
            prompt_tokens,
            candidate_tokens,
            total_tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            candidate_tokens: self.candidate_tokens.saturating_add(rhs.candidate_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}
