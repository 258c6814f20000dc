//! Prompts for question-paper generation.
//!
//! Every prompt lives here so the wording can change in one place and unit
//! tests can inspect it without calling a model. Callers can override the
//! system prompt via [`crate::config::GenerationConfig::system_prompt`].
//!
//! [`build_prompt`] is a pure function: the random part of a prompt is the
//! [`VariationToken`], which is generated by the caller and passed in.

use crate::config::{Instructions, QuestionPattern};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default system prompt, used when `GenerationConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert question paper setter. \
You write clear, unambiguous exam questions that are answerable from the \
supplied study material alone.";

/// Layout the model is asked to follow for pattern-based papers.
pub const PAPER_FORMAT: &str = r#"Format clearly like this:
📘 **Question Paper**
---
**Section A (2 Marks Questions)**
1. ...
2. ...

**Section B (5 Marks Questions)**
1. ...
2. ...

**Section C (10 Marks Questions)**
1. ...
2. ..."#;

/// Opaque value embedded in the prompt so repeated requests with the same
/// document do not produce identical papers. It carries no meaning for the
/// model beyond being different each time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariationToken(String);

impl VariationToken {
    /// A fresh random token (16 lowercase hex digits).
    pub fn random() -> Self {
        let value: u64 = rand::thread_rng().gen();
        Self(format!("{value:016x}"))
    }

    /// A fixed token, for reproducible prompts.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render the user prompt from an excerpt, the instructions and a token.
pub fn build_prompt(excerpt: &str, instructions: &Instructions, token: &VariationToken) -> String {
    let requirements = match instructions {
        Instructions::Pattern(pattern) => pattern_requirements(pattern),
        Instructions::Custom(text) => format!("Follow these instructions:\n{}", text.trim()),
    };

    format!(
        "Create a question paper based on the following study material:\n\
\n\
--- Document Content Start ---\n\
{excerpt}\n\
--- Document Content End ---\n\
\n\
{requirements}\n\
\n\
Variation id: {token}\n\
Use the variation id only to pick a different selection of topics and \
phrasings than you might otherwise; never print it."
    )
}

fn pattern_requirements(pattern: &QuestionPattern) -> String {
    format!(
        "Generate:\n\
- {} questions of 2 marks\n\
- {} questions of 5 marks\n\
- {} questions of 10 marks\n\
\n\
{PAPER_FORMAT}",
        pattern.two_mark, pattern.five_mark, pattern.ten_mark
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_counts_appear_in_prompt() {
        let p = build_prompt(
            "Photosynthesis converts light to chemical energy.",
            &Instructions::Pattern(QuestionPattern::new(4, 3, 1)),
            &VariationToken::fixed("abc"),
        );
        assert!(p.contains("- 4 questions of 2 marks"));
        assert!(p.contains("- 3 questions of 5 marks"));
        assert!(p.contains("- 1 questions of 10 marks"));
        assert!(p.contains("Photosynthesis converts light"));
        assert!(p.contains("Section C (10 Marks Questions)"));
    }

    #[test]
    fn custom_instructions_replace_pattern() {
        let p = build_prompt(
            "text",
            &Instructions::Custom("  Ten MCQs with answers.  ".into()),
            &VariationToken::fixed("abc"),
        );
        assert!(p.contains("Follow these instructions:\nTen MCQs with answers."));
        assert!(!p.contains("questions of 2 marks"));
    }

    #[test]
    fn same_inputs_same_prompt() {
        let instr = Instructions::default();
        let token = VariationToken::fixed("0123456789abcdef");
        assert_eq!(
            build_prompt("doc", &instr, &token),
            build_prompt("doc", &instr, &token)
        );
    }

    #[test]
    fn different_tokens_differ_only_in_token() {
        let instr = Instructions::default();
        let t1 = VariationToken::fixed("1111111111111111");
        let t2 = VariationToken::fixed("2222222222222222");
        let p1 = build_prompt("doc body", &instr, &t1);
        let p2 = build_prompt("doc body", &instr, &t2);

        assert_ne!(p1, p2);
        assert_eq!(p1.replace(t1.as_str(), ""), p2.replace(t2.as_str(), ""));
    }

    #[test]
    fn random_tokens_are_hex_and_vary() {
        let a = VariationToken::random();
        let b = VariationToken::random();
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
