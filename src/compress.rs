//! Contextual compression: keep only the parts of each passage that bear on
//! the question.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use lexctx_core::llm::LanguageModel;
use lexctx_core::models::{CompressedExcerpt, FusedPassage};

use crate::error::LlmError;
use crate::prompts::{extraction_prompt, NO_OUTPUT};

pub struct ContextCompressor {
    llm: Arc<dyn LanguageModel>,
    max_concurrency: usize,
    timeout: Duration,
}

impl ContextCompressor {
    pub fn new(llm: Arc<dyn LanguageModel>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            llm,
            max_concurrency: max_concurrency.max(1),
            timeout,
        }
    }

    /// One extraction call per passage, at most `max_concurrency` in flight.
    /// Results keep the input order; irrelevant or failed passages are
    /// dropped. With the model disabled, passages pass through whole.
    pub async fn compress_excerpts(
        &self,
        query: &str,
        passages: &[FusedPassage],
    ) -> Vec<CompressedExcerpt> {
        let results: Vec<Option<CompressedExcerpt>> = stream::iter(passages)
            .map(|p| self.extract(query, p))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let kept: Vec<CompressedExcerpt> = results.into_iter().flatten().collect();
        tracing::debug!(passages = passages.len(), kept = kept.len(), "compressed");
        kept
    }

    /// Relevant excerpts joined by blank lines; `""` when nothing is relevant.
    pub async fn compress(&self, query: &str, passages: &[FusedPassage]) -> String {
        self.compress_excerpts(query, passages)
            .await
            .into_iter()
            .map(|e| e.text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn extract(&self, query: &str, passage: &FusedPassage) -> Option<CompressedExcerpt> {
        let prompt = extraction_prompt(query, &passage.text);
        let text = match tokio::time::timeout(self.timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) if matches!(e.downcast_ref::<LlmError>(), Some(LlmError::Disabled)) => {
                passage.text.clone()
            }
            Ok(Err(e)) => {
                tracing::warn!(passage = %passage.id, error = %e, "compression failed, passage dropped");
                return None;
            }
            Err(_) => {
                let e = LlmError::Timeout(self.timeout.as_secs());
                tracing::warn!(passage = %passage.id, error = %e, "compression failed, passage dropped");
                return None;
            }
        };

        let text = text.trim();
        if text.is_empty() || text == NO_OUTPUT {
            return None;
        }
        Some(CompressedExcerpt {
            passage_id: passage.id.clone(),
            text: text.to_string(),
            score: passage.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use lexctx_core::models::{Origin, SourceMeta};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn passage(id: &str, text: &str, score: f64) -> FusedPassage {
        FusedPassage {
            id: id.to_string(),
            collection: "user_alice".to_string(),
            origin: Origin::User,
            text: text.to_string(),
            meta: SourceMeta::default(),
            score,
        }
    }

    /// Echoes the passage when it mentions "relevant"; tracks peak concurrency.
    struct EchoModel {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if prompt.contains("boom") {
                bail!("upstream 500");
            }
            let body = prompt
                .split(">>>\n")
                .nth(1)
                .unwrap_or_default()
                .trim_end_matches('\n');
            if body.contains("relevant") {
                Ok(format!("  {}  ", body))
            } else {
                Ok(NO_OUTPUT.to_string())
            }
        }
    }

    #[tokio::test]
    async fn keeps_order_drops_irrelevant_and_failed() {
        let llm = Arc::new(EchoModel {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let compressor = ContextCompressor::new(llm.clone(), 2, Duration::from_secs(5));
        let passages = vec![
            passage("a", "first relevant clause", 0.9),
            passage("b", "weather report", 0.8),
            passage("c", "boom relevant", 0.7),
            passage("d", "second relevant clause", 0.6),
            passage("e", "third relevant clause", 0.5),
        ];

        let excerpts = compressor.compress_excerpts("q", &passages).await;
        let ids: Vec<&str> = excerpts.iter().map(|e| e.passage_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "e"]);
        assert!(llm.peak.load(Ordering::SeqCst) <= 2);

        let joined = compressor.compress("q", &passages).await;
        assert_eq!(
            joined,
            "first relevant clause\n\nsecond relevant clause\n\nthird relevant clause"
        );
    }

    #[tokio::test]
    async fn nothing_relevant_is_empty_string() {
        let llm = Arc::new(EchoModel {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let compressor = ContextCompressor::new(llm, 4, Duration::from_secs(5));
        let out = compressor
            .compress("q", &[passage("x", "weather report", 0.4)])
            .await;
        assert_eq!(out, "");
        assert_eq!(compressor.compress("q", &[]).await, "");
    }

    #[tokio::test]
    async fn disabled_model_passes_passages_through() {
        let compressor = ContextCompressor::new(
            Arc::new(crate::llm::DisabledModel),
            4,
            Duration::from_secs(5),
        );
        let out = compressor
            .compress("q", &[passage("a", "clause one", 0.9), passage("b", "clause two", 0.5)])
            .await;
        assert_eq!(out, "clause one\n\nclause two");
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        fn model_name(&self) -> &str {
            "slow"
        }
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_passage_is_dropped() {
        let compressor = ContextCompressor::new(Arc::new(SlowModel), 4, Duration::from_secs(1));
        let out = compressor.compress("q", &[passage("x", "relevant", 0.4)]).await;
        assert_eq!(out, "");
    }
}
