//! Multi-query expansion.
//!
//! The language model rewrites the question a few different ways; each
//! phrasing is retrieved separately and the results are unioned. When the
//! model is unavailable, retrieval falls back to the original query alone.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use lexctx_core::fusion::merge_max;
use lexctx_core::llm::LanguageModel;
use lexctx_core::models::FusedPassage;

use crate::error::{LlmError, RetrievalError};
use crate::prompts::paraphrase_prompt;
use crate::retrieve::HybridRetriever;

pub struct QueryExpander {
    llm: Arc<dyn LanguageModel>,
    retriever: Arc<HybridRetriever>,
    paraphrases: usize,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<HybridRetriever>,
        paraphrases: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            retriever,
            paraphrases,
            timeout,
        }
    }

    /// Alternative phrasings of `query`. Never fails: any model error or
    /// timeout yields an empty list.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        if self.paraphrases == 0 {
            return Vec::new();
        }
        let prompt = paraphrase_prompt(query, self.paraphrases);
        let raw = match tokio::time::timeout(self.timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                if matches!(e.downcast_ref::<LlmError>(), Some(LlmError::Disabled)) {
                    tracing::debug!("query expansion skipped: language model disabled");
                } else {
                    tracing::warn!(error = %e, "query expansion failed");
                }
                return Vec::new();
            }
            Err(_) => {
                let e = LlmError::Timeout(self.timeout.as_secs());
                tracing::warn!(error = %e, "query expansion failed");
                return Vec::new();
            }
        };

        let paraphrases = parse_paraphrases(&raw, query, self.paraphrases);
        tracing::debug!(count = paraphrases.len(), "query expanded");
        paraphrases
    }

    /// Retrieve with the original query plus its paraphrases, keeping each
    /// passage's best fused score.
    pub async fn retrieve(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<Vec<FusedPassage>, RetrievalError> {
        let mut queries = vec![query.to_string()];
        queries.extend(self.expand(query).await);

        let vectors = self.retriever.embed_queries(&queries).await?;

        let lists = join_all(
            vectors
                .iter()
                .map(|v| self.retriever.retrieve(v, user_id)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        Ok(merge_max(lists))
    }
}

/// Parse one paraphrase per line, stripping list markers and dropping
/// blanks and restatements of the original.
pub fn parse_paraphrases(raw: &str, original: &str, cap: usize) -> Vec<String> {
    let original = original.trim().to_lowercase();
    let mut out: Vec<String> = Vec::new();

    for line in raw.lines() {
        let text = strip_list_marker(line.trim()).trim();
        if text.is_empty() {
            continue;
        }
        let lowered = text.to_lowercase();
        if lowered == original || out.iter().any(|q| q.to_lowercase() == lowered) {
            continue;
        }
        out.push(text.to_string());
        if out.len() == cap {
            break;
        }
    }
    out
}

fn strip_list_marker(line: &str) -> &str {
    let bullet = line.trim_start_matches(['-', '*', '•']);
    if bullet.len() != line.len() {
        return bullet;
    }
    let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if digits.len() != line.len() {
        if let Some(rest) = digits
            .strip_prefix('.')
            .or_else(|| digits.strip_prefix(')'))
        {
            return rest;
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_and_bulleted_lines() {
        let raw = "1. What ends a lease early?\n\n2) Early termination of tenancy\n- Breaking a rental agreement";
        assert_eq!(
            parse_paraphrases(raw, "Can I end my lease early?", 3),
            vec![
                "What ends a lease early?",
                "Early termination of tenancy",
                "Breaking a rental agreement",
            ]
        );
    }

    #[test]
    fn drops_original_duplicates_and_caps() {
        let raw = "Can I end my lease early?\nearly exit\nEarly exit\nlease break\nanother";
        assert_eq!(
            parse_paraphrases(raw, "can i end my lease early?", 2),
            vec!["early exit", "lease break"]
        );
    }

    #[test]
    fn numbers_without_markers_are_kept() {
        assert_eq!(
            parse_paraphrases("2024 rent increase rules", "q", 3),
            vec!["2024 rent increase rules"]
        );
    }
}
