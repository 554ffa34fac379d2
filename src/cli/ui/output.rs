use console::style;

use crate::types::{QuizDraft, TokenUsage};

const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn quiz(&self, quiz: &QuizDraft) {
        self.header(&quiz.title);
        for (i, question) in quiz.questions.iter().enumerate() {
            println!(
                "\n{} {} {}",
                style(format!("{}.", i + 1)).bold(),
                question.text,
                style(format!("[{}]", question.topic)).dim()
            );
            for (label, option) in OPTION_LABELS.iter().zip(&question.options) {
                let marker = if option.is_correct {
                    style("✓").green().to_string()
                } else {
                    " ".to_string()
                };
                println!("   {} {}) {}", marker, label, option.text);
                if !option.explanation.is_empty() {
                    println!("        {}", style(&option.explanation).dim());
                }
            }
        }
        println!();
    }

    pub fn usage(&self, usage: &TokenUsage) {
        self.info(&format!(
            "Tokens: {} prompt, {} candidate, {} total",
            usage.prompt_tokens, usage.candidate_tokens, usage.total_tokens
        ));
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
