//! Query expansion: sub-question decomposition and HyDE.
//!
//! Both stages are best-effort. Any provider failure yields an empty result.

use coderag_llm::{GenerateRequest, LlmProvider};

const MAX_SUB_QUESTIONS: usize = 3;

const DECOMPOSE_SYSTEM: &str = "You are a query assistant for a code search engine.";

fn decompose_prompt(query: &str) -> String {
    format!(
        "Decompose this query into 2-3 atomic sub-questions about the code base.\n\
         Query: {query}\n\n\
         Return JSON: {{\"questions\": [\"q1\", \"q2\"]}}"
    )
}

fn hyde_prompt(query: &str) -> String {
    format!("Write a hypothetical code snippet or documentation that answers this query:\nQuery: {query}\n\nCode/Doc:")
}

/// Sub-questions from a `{"questions": [...]}` response: trimmed, non-empty, distinct
/// from the query and from each other, at most three.
#[must_use]
pub fn parse_questions(response: &str, query: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(response) else {
        return Vec::new();
    };
    let Some(items) = value.get("questions").and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };
    let query = query.trim().to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for q in items.iter().filter_map(serde_json::Value::as_str) {
        let q = q.trim();
        let lower = q.to_lowercase();
        if q.is_empty() || lower == query || out.iter().any(|o| o.to_lowercase() == lower) {
            continue;
        }
        out.push(q.to_owned());
        if out.len() == MAX_SUB_QUESTIONS {
            break;
        }
    }
    out
}

pub(crate) async fn decompose<P: LlmProvider>(provider: &P, query: &str) -> Vec<String> {
    let request = GenerateRequest::new(decompose_prompt(query))
        .system(DECOMPOSE_SYSTEM)
        .json();
    match provider.generate(&request).await {
        Ok(response) => {
            let questions = parse_questions(&response, query);
            if !questions.is_empty() {
                tracing::debug!(?questions, "query decomposed");
            }
            questions
        }
        Err(e) => {
            tracing::warn!(error = %e, "query decomposition failed");
            Vec::new()
        }
    }
}

pub(crate) async fn hyde<P: LlmProvider>(provider: &P, query: &str) -> Option<String> {
    let request = GenerateRequest::new(hyde_prompt(query)).temperature(0.0);
    match provider.generate(&request).await {
        Ok(doc) => {
            let doc = doc.trim();
            (!doc.is_empty()).then(|| doc.to_owned())
        }
        Err(e) => {
            tracing::warn!(error = %e, "hyde generation failed");
            None
        }
    }
}
