//! Rule-based stand-in for a trained state classifier

use async_trait::async_trait;
use eeg_core::FeatureVector;
use eeg_stream::Classifier;

pub const CALM: &str = "calm";
pub const ANXIOUS: &str = "anxious";

/// `"calm"` when alpha power is at least `ratio` times beta power
#[derive(Debug, Clone)]
pub struct BandRatioClassifier {
    ratio: f64,
}

impl BandRatioClassifier {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn label(&self, features: &FeatureVector) -> &'static str {
        if features.alpha >= self.ratio * features.beta {
            CALM
        } else {
            ANXIOUS
        }
    }
}

impl Default for BandRatioClassifier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Classifier for BandRatioClassifier {
    async fn classify(&self, features: &FeatureVector) -> anyhow::Result<String> {
        Ok(self.label(features).to_string())
    }

    fn name(&self) -> &str {
        "band-ratio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(alpha: f64, beta: f64) -> FeatureVector {
        FeatureVector::from_powers([0.1, 0.1, alpha, beta]).unwrap()
    }

    #[tokio::test]
    async fn test_alpha_beta_ratio() {
        let classifier = BandRatioClassifier::default();
        assert_eq!(classifier.classify(&features(0.6, 0.2)).await.unwrap(), CALM);
        assert_eq!(classifier.classify(&features(0.2, 0.6)).await.unwrap(), ANXIOUS);
        // Ties count as calm
        assert_eq!(classifier.label(&features(0.3, 0.3)), CALM);
        assert_eq!(classifier.label(&FeatureVector::default()), CALM);
    }

    #[test]
    fn test_custom_ratio() {
        let classifier = BandRatioClassifier::new(2.0);
        assert_eq!(classifier.label(&features(0.5, 0.3)), ANXIOUS);
        assert_eq!(classifier.label(&features(0.7, 0.3)), CALM);
    }
}
