//! Image-analysis collaborator contract.
//!
//! Image scoring is owned by a separate service; the orchestrator only
//! consumes this trait. Implementations must be total: a backend that
//! fails to analyze the image contributes a zeroed placeholder verdict
//! instead of an error.

use std::collections::BTreeMap;

use async_trait::async_trait;

use sentira_types::{BackendId, ImageVerdict};

/// Scores a referenced image against a set of backends.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyze `image_ref` with every backend in `backends` that supports
    /// images. Failures collapse to `ImageVerdict { score: 0.0, .. }`
    /// placeholders; backends without image support are simply absent
    /// from the result.
    async fn analyze(
        &self,
        image_ref: &str,
        backends: &[BackendId],
    ) -> BTreeMap<BackendId, ImageVerdict>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAnalyzer;

    #[async_trait]
    impl ImageAnalyzer for StubAnalyzer {
        async fn analyze(
            &self,
            _image_ref: &str,
            backends: &[BackendId],
        ) -> BTreeMap<BackendId, ImageVerdict> {
            backends
                .iter()
                .filter(|id| id.is_remote())
                .map(|id| {
                    (*id, ImageVerdict { score: 0.3, description: "a sunny street".into() })
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn stub_returns_remote_verdicts_only() {
        let analyzer = StubAnalyzer;
        let verdicts = analyzer
            .analyze("s3://bucket/img.png", &[BackendId::Lexicon, BackendId::Gpt4])
            .await;
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts.contains_key(&BackendId::Gpt4));
    }
}
