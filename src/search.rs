//! `energichain search` and `energichain ask`.

use anyhow::{bail, Result};

use energichain_rag_core::models::SourceRef;

use crate::config::Config;
use crate::engine::{load_engine, CompletionUse};
use crate::progress::ProgressMode;

fn check_top_k(config: &Config, top_k: Option<usize>) -> Result<()> {
    if let Some(k) = top_k {
        if k < 1 || k > config.retrieval.max_top_k {
            bail!(
                "--top-k must be between 1 and {}",
                config.retrieval.max_top_k
            );
        }
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    check_top_k(config, top_k)?;

    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let loaded = load_engine(config, progress, CompletionUse::Skip).await?;
    let results = loaded.engine.search(query, top_k).await?;

    if json {
        let results: Vec<SourceRef> = results.iter().map(SourceRef::from).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "results": results }))?
        );
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} / {}",
            i + 1,
            result.similarity,
            result.document.category,
            result.document.title
        );
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.document.content, 160)
        );
        println!("    id: {}", result.document.id);
        println!();
    }

    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    language: &str,
    top_k: Option<usize>,
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    check_top_k(config, top_k)?;

    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let loaded = load_engine(config, progress, CompletionUse::Required).await?;
    let answer = loaded.engine.answer(question, language, top_k).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "answer": answer.text,
                "sources": answer.sources,
                "confidence": answer.confidence,
            }))?
        );
        return Ok(());
    }

    println!("{}", answer.text);
    println!();
    println!("confidence: {:.3}", answer.confidence);
    if answer.sources.is_empty() {
        println!("sources: none");
    } else {
        println!("sources:");
        for (i, s) in answer.sources.iter().enumerate() {
            println!(
                "  [{}] {} ({}, {:.3}) id: {}",
                i + 1,
                s.title,
                s.category,
                s.similarity,
                s.id
            );
        }
    }

    Ok(())
}

/// First `max_chars` characters of `text` on one line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
