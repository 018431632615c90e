//! Prompt assembly and answer scoring.
//!
//! Retrieved documents become numbered context blocks:
//!
//! ```text
//! [1] Gas Leak Detection (safety)
//! If you smell gas, turn off the cylinder valve ...
//!
//! [2] ...
//! ```
//!
//! followed by the question and an instruction naming the response language.

use crate::models::RetrievalResult;

/// Returned verbatim when retrieval finds nothing to ground an answer on.
pub const FALLBACK_ANSWER: &str = "I don't have enough information to answer that question.";

/// Default response language code.
pub const DEFAULT_LANGUAGE: &str = "en";

const SYSTEM_PROMPT: &str = "You are the EnergiChain assistant, helping customers and \
distributors with LPG safety, cylinder orders, deliveries, and payments. Answer using only \
the numbered context documents. Cite the documents you used by their number, e.g. [1]. If \
the context does not contain the answer, say that you do not have enough information.";

/// A prompt split into the system instruction and the user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Map a language code to the name used in the prompt instruction.
///
/// Unknown codes are passed through unchanged so the model can still try.
pub fn language_name(code: &str) -> &str {
    match code.trim().to_ascii_lowercase().as_str() {
        "" | "en" => "English",
        "hi" => "Hindi",
        "sw" => "Swahili",
        "fr" => "French",
        "es" => "Spanish",
        "pt" => "Portuguese",
        "ar" => "Arabic",
        "bn" => "Bengali",
        "ta" => "Tamil",
        "yo" => "Yoruba",
        "ha" => "Hausa",
        "am" => "Amharic",
        _ => code.trim(),
    }
}

/// Render the numbered context blocks.
pub fn format_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {} ({})\n{}",
                i + 1,
                r.document.title,
                r.document.category,
                r.document.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the prompt for `question` grounded on `results`.
pub fn build_prompt(question: &str, language: &str, results: &[RetrievalResult]) -> Prompt {
    let user = format!(
        "Context:\n{}\n\nQuestion: {}\n\nRespond in {}.",
        format_context(results),
        question.trim(),
        language_name(language)
    );
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Mean similarity of the retrieved documents; `0.0` when there are none.
pub fn confidence(results: &[RetrievalResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let sum: f32 = results.iter().map(|r| r.similarity).sum();
    sum / results.len() as f32
}
