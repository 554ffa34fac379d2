//! Quiz prompt template
//!
//! The instruction template is fixed and not user-configurable. Retries reuse
//! it with an appended question cap to reduce truncation risk.

use crate::constants::retry::{BASE_QUESTION_CAP, QUESTION_CAP_STEP};

pub const QUIZ_PROMPT: &str = r#"Generate a comprehensive multiple-choice quiz from the content of the attached documents. Follow every requirement below:

1. Give the quiz a descriptive title that reflects the main subject of the documents.
2. Cover ALL main topics and subtopics so that no significant concept is left out. Record the topic of each question so questions can later be grouped by topic.
3. Balance the kinds of questions:
   - factual recall
   - comprehension of concepts
   - application and analysis: applying principles to new scenarios, relating concepts, connecting ideas across sections
   - synthesis and evaluation: implications of key ideas, competing approaches, predicted outcomes, unstated assumptions
4. For analytical questions, favour second and third order thinking: "what would happen if" scenarios, the mechanisms behind facts, interactions between concepts, and limits of stated principles.
5. Every question has exactly 4 options and exactly one of them is correct.
6. For EACH option:
   - write a concise "explanation" grounded in the documents of why the option is right or wrong, without the words "this is correct" or "this is incorrect"
   - make wrong options plausible by drawing on common misconceptions or partial understanding
   - keep all options similar in length, detail, grammar and tone
   - never include joke or obviously wrong options

Respond with a single JSON object of this shape:
{
  "title": "Descriptive quiz title",
  "questions": [
    {
      "text": "Question text?",
      "topic": "Topic of the question",
      "options": [
        {"text": "Option A", "is_correct": false, "explanation": "Why A does not hold."},
        {"text": "Option B", "is_correct": true, "explanation": "Why B holds."},
        {"text": "Option C", "is_correct": false, "explanation": "Why C does not hold."},
        {"text": "Option D", "is_correct": false, "explanation": "Why D does not hold."}
      ]
    }
  ]
}
"#;

/// Question cap requested on a given attempt (50, 35, 20, ...), never below 1
pub fn question_cap(attempt: usize) -> usize {
    BASE_QUESTION_CAP
        .saturating_sub(attempt.saturating_mul(QUESTION_CAP_STEP))
        .max(1)
}

/// Prompt text for an attempt; retries carry an explicit question cap
pub fn prompt_for_attempt(attempt: usize) -> String {
    if attempt == 0 {
        return QUIZ_PROMPT.to_string();
    }
    format!(
        "{}\n\nIMPORTANT: Due to size constraints, please limit your response to no more than {} questions.",
        QUIZ_PROMPT,
        question_cap(attempt)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_caps() {
        assert_eq!(question_cap(0), 50);
        assert_eq!(question_cap(1), 35);
        assert_eq!(question_cap(2), 20);
        assert_eq!(question_cap(10), 1);
    }

    #[test]
    fn test_first_attempt_is_plain_template() {
        assert_eq!(prompt_for_attempt(0), QUIZ_PROMPT);
    }

    #[test]
    fn test_retry_prompt_limits_questions() {
        let prompt = prompt_for_attempt(2);
        assert!(prompt.starts_with(QUIZ_PROMPT));
        assert!(prompt.ends_with("no more than 20 questions."));
    }

    #[test]
    fn test_template_names_every_field() {
        for field in ["\"title\"", "\"questions\"", "\"topic\"", "\"is_correct\"", "\"explanation\""] {
            assert!(QUIZ_PROMPT.contains(field), "missing {}", field);
        }
    }
}
