//! Bridge to the external classifier
//!
//! The classifier is opaque: a feature vector goes in, a label comes out.
//! Failures and timeouts never reach the stream; they become `"unknown"`.

use anyhow::Context;
use async_trait::async_trait;
use eeg_core::{unix_now_secs, ClassificationResult, FeatureVector, UNKNOWN_LABEL};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// External feature-vector to label capability
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, features: &FeatureVector) -> anyhow::Result<String>;

    /// Name used in logs
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Wraps a synchronous function as a [`Classifier`]
///
/// The function runs on tokio's blocking pool, so a slow call cannot stall
/// the runtime and is still cut off by the adapter's timeout.
pub struct FnClassifier<F> {
    name: String,
    func: Arc<F>,
}

impl<F> FnClassifier<F>
where
    F: Fn(&FeatureVector) -> anyhow::Result<String> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> Classifier for FnClassifier<F>
where
    F: Fn(&FeatureVector) -> anyhow::Result<String> + Send + Sync + 'static,
{
    async fn classify(&self, features: &FeatureVector) -> anyhow::Result<String> {
        let func = Arc::clone(&self.func);
        let features = *features;
        tokio::task::spawn_blocking(move || func(&features))
            .await
            .context("classifier function panicked")?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Calls the classifier under a timeout and stamps the result
#[derive(Clone)]
pub struct ClassificationAdapter {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
}

impl ClassificationAdapter {
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Always yields a result; the label is `"unknown"` if the call fails or times out
    pub async fn classify(&self, features: FeatureVector) -> ClassificationResult {
        let label = match tokio::time::timeout(self.timeout, self.classifier.classify(&features)).await {
            Ok(Ok(label)) => label,
            Ok(Err(err)) => {
                warn!(classifier = self.classifier.name(), error = %err, "classification failed");
                UNKNOWN_LABEL.to_string()
            }
            Err(_) => {
                warn!(
                    classifier = self.classifier.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "classification timed out"
                );
                UNKNOWN_LABEL.to_string()
            }
        };
        ClassificationResult::new(features, label, unix_now_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct SlowClassifier {
        delay: Duration,
    }

    #[async_trait]
    impl Classifier for SlowClassifier {
        async fn classify(&self, _features: &FeatureVector) -> anyhow::Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok("calm".to_string())
        }
    }

    fn features() -> FeatureVector {
        FeatureVector::from_powers([0.1, 0.2, 0.9, 0.3]).unwrap()
    }

    #[tokio::test]
    async fn test_label_passes_through() {
        let classifier = FnClassifier::new("ratio", |f: &FeatureVector| {
            Ok(if f.alpha >= f.beta { "calm" } else { "anxious" }.to_string())
        });
        let adapter = ClassificationAdapter::new(Arc::new(classifier), Duration::from_millis(100));
        let result = adapter.classify(features()).await;

        assert_eq!(result.label, "calm");
        assert_eq!(result.features, features());
        assert!(result.timestamp > 0.0);
    }

    #[tokio::test]
    async fn test_failure_becomes_unknown() {
        let classifier = FnClassifier::new("broken", |_: &FeatureVector| Err(anyhow!("model not loaded")));
        let adapter = ClassificationAdapter::new(Arc::new(classifier), Duration::from_millis(100));
        let result = adapter.classify(features()).await;

        assert!(result.is_unknown());
        assert_eq!(result.features, features());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_unknown() {
        let adapter = ClassificationAdapter::new(
            Arc::new(SlowClassifier {
                delay: Duration::from_secs(5),
            }),
            Duration::from_millis(500),
        );
        let started = tokio::time::Instant::now();
        let result = adapter.classify(features()).await;

        assert!(result.is_unknown());
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_blocking_function_is_timed_out() {
        let classifier = FnClassifier::new("stuck", |_: &FeatureVector| {
            std::thread::sleep(Duration::from_millis(400));
            Ok("calm".to_string())
        });
        let adapter = ClassificationAdapter::new(Arc::new(classifier), Duration::from_millis(50));
        let started = std::time::Instant::now();
        let result = adapter.classify(features()).await;

        assert!(result.is_unknown());
        assert!(started.elapsed() < Duration::from_millis(300), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_panicking_function_becomes_unknown() {
        let classifier = FnClassifier::new("panics", |_: &FeatureVector| -> anyhow::Result<String> {
            panic!("model exploded")
        });
        let adapter = ClassificationAdapter::new(Arc::new(classifier), Duration::from_millis(500));
        assert!(adapter.classify(features()).await.is_unknown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_but_in_time() {
        let adapter = ClassificationAdapter::new(
            Arc::new(SlowClassifier {
                delay: Duration::from_millis(200),
            }),
            Duration::from_millis(500),
        );
        assert_eq!(adapter.classify(features()).await.label, "calm");
    }
}
