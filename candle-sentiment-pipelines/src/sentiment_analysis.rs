use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use candle_core::{DType, Device};
use candle_sentiment::{Error, FromPretrainedParameters, Result};

use crate::text_classification::TextClassificationPipeline;

/// Prefix of the report returned when the model could not be loaded or run.
pub const ANALYSIS_ERROR_PREFIX: &str = "Sentiment analysis failed: ";

pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// Something that maps a text to `(label, score)` pairs sorted by descending score.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Vec<(String, f32)>>;
}

impl TextClassifier for TextClassificationPipeline {
    fn classify(&self, text: &str) -> Result<Vec<(String, f32)>> {
        self.run(text, Some(1))
    }
}

/// Provides a ready to use `TextClassifier` for a fixed model.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn TextClassifier>>;
}

/// Loads a `TextClassificationPipeline` from the Hugging Face Hub on every call.
#[derive(Debug, Clone)]
pub struct PretrainedModelLoader {
    identifier: String,
    device: Device,
    dtype: Option<DType>,
    params: Option<FromPretrainedParameters>,
}

impl PretrainedModelLoader {
    pub fn new<S: Into<String>>(
        identifier: S,
        device: Device,
        dtype: Option<DType>,
        params: Option<FromPretrainedParameters>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            device,
            dtype,
            params,
        }
    }

    pub fn get_identifier(&self) -> &str {
        &self.identifier
    }
}

impl Default for PretrainedModelLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SENTIMENT_MODEL, Device::Cpu, None, None)
    }
}

impl ModelLoader for PretrainedModelLoader {
    fn load(&self) -> Result<Arc<dyn TextClassifier>> {
        let start = Instant::now();
        let pipeline = TextClassificationPipeline::new(
            self.identifier.as_str(),
            &self.device,
            self.dtype,
            self.params.clone(),
        )?;
        tracing::info!(
            "Loaded model '{}' in {:.2?}",
            self.identifier,
            start.elapsed()
        );
        Ok(Arc::new(pipeline))
    }
}

/// Keeps the first classifier successfully loaded by the inner loader. Failed loads are not
/// cached, so the next call tries again.
pub struct CachedModelLoader<L: ModelLoader> {
    inner: L,
    cached: Mutex<Option<Arc<dyn TextClassifier>>>,
}

impl<L: ModelLoader> CachedModelLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

impl<L: ModelLoader> ModelLoader for CachedModelLoader<L> {
    fn load(&self) -> Result<Arc<dyn TextClassifier>> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| Error::msg("model cache lock poisoned"))?;
        if let Some(classifier) = cached.as_ref() {
            return Ok(Arc::clone(classifier));
        }
        let classifier = self.inner.load()?;
        *cached = Some(Arc::clone(&classifier));
        Ok(classifier)
    }
}

/// Whether the model is loaded again for every request or shared between requests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    #[default]
    PerRequest,
    Shared,
}

/// Wraps `loader` according to the load policy.
pub fn build_model_loader<L: ModelLoader + 'static>(
    loader: L,
    policy: LoadPolicy,
) -> Arc<dyn ModelLoader> {
    match policy {
        LoadPolicy::PerRequest => Arc::new(loader),
        LoadPolicy::Shared => Arc::new(CachedModelLoader::new(loader)),
    }
}

/// Formats the classification results of `text` as a human readable report.
pub fn format_report(text: &str, results: &[(String, f32)]) -> String {
    results
        .iter()
        .map(|(label, score)| format!("Text: {text}\nSentiment: {label}\nConfidence: {score:.4}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classifies `text` with a classifier obtained from `loader` and returns the formatted report.
/// Errors are reported in the returned string and never propagated.
pub fn analyze_sentiment(loader: &dyn ModelLoader, text: &str) -> String {
    match loader.load().and_then(|classifier| classifier.classify(text)) {
        Ok(results) => format_report(text, &results),
        Err(e) => {
            tracing::warn!("Sentiment analysis failed for input of {} bytes: {}", text.len(), e);
            format!("{ANALYSIS_ERROR_PREFIX}{e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier(Vec<(String, f32)>);

    impl TextClassifier for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<Vec<(String, f32)>> {
            Ok(self.0.clone())
        }
    }

    struct FailingClassifier;

    impl TextClassifier for FailingClassifier {
        fn classify(&self, _text: &str) -> Result<Vec<(String, f32)>> {
            Err(Error::SequenceTooLong(600, 512))
        }
    }

    /// Counts the loads and fails the first `failures` of them.
    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        failures: usize,
        classifier: Arc<dyn TextClassifier>,
    }

    impl CountingLoader {
        fn new(classifier: Arc<dyn TextClassifier>, failures: usize) -> (Self, Arc<AtomicUsize>) {
            let loads = Arc::new(AtomicUsize::new(0));
            let loader = Self {
                loads: Arc::clone(&loads),
                failures,
                classifier,
            };
            (loader, loads)
        }
    }

    impl ModelLoader for CountingLoader {
        fn load(&self) -> Result<Arc<dyn TextClassifier>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(Error::RepositoryNotFound(DEFAULT_SENTIMENT_MODEL.to_string()));
            }
            Ok(Arc::clone(&self.classifier))
        }
    }

    fn positive() -> Arc<dyn TextClassifier> {
        Arc::new(FixedClassifier(vec![("POSITIVE".to_string(), 0.99987)]))
    }

    #[test]
    fn test_report_format() {
        let (loader, _) = CountingLoader::new(positive(), 0);
        let report = analyze_sentiment(&loader, "I love this product!");
        assert_eq!(
            report,
            "Text: I love this product!\nSentiment: POSITIVE\nConfidence: 0.9999"
        );
    }

    #[test]
    fn test_confidence_has_four_decimals() {
        let report = format_report("meh", &[("NEGATIVE".to_string(), 0.5)]);
        assert_eq!(report.lines().last(), Some("Confidence: 0.5000"));
        let report = format_report("meh", &[("NEGATIVE".to_string(), 1.0)]);
        assert_eq!(report.lines().last(), Some("Confidence: 1.0000"));
    }

    #[test]
    fn test_multiple_results_are_joined_by_newlines() {
        let report = format_report(
            "ok",
            &[("POSITIVE".to_string(), 0.6), ("NEGATIVE".to_string(), 0.4)],
        );
        assert_eq!(report.lines().count(), 6);
        assert!(report.starts_with("Text: ok\nSentiment: POSITIVE\n"));
        assert!(report.ends_with("Sentiment: NEGATIVE\nConfidence: 0.4000"));
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let text = "  <b>multi\nline</b> 日本語 ";
        let report = format_report(text, &[("POSITIVE".to_string(), 0.7)]);
        assert!(report.starts_with(&format!("Text: {text}\n")));
    }

    #[test]
    fn test_empty_input() {
        let (loader, _) = CountingLoader::new(positive(), 0);
        let report = analyze_sentiment(&loader, "");
        assert!(report.starts_with("Text: \nSentiment: POSITIVE"));
    }

    #[test]
    fn test_load_failure_is_reported() {
        let (loader, _) = CountingLoader::new(positive(), 1);
        let report = analyze_sentiment(&loader, "I love this product!");
        assert!(report.starts_with(ANALYSIS_ERROR_PREFIX));
        assert!(report.contains(DEFAULT_SENTIMENT_MODEL));
    }

    #[test]
    fn test_classify_failure_is_reported() {
        let (loader, _) = CountingLoader::new(Arc::new(FailingClassifier), 0);
        let report = analyze_sentiment(&loader, "too long");
        assert_eq!(
            report,
            format!(
                "{ANALYSIS_ERROR_PREFIX}{}",
                Error::SequenceTooLong(600, 512)
            )
        );
    }

    #[test]
    fn test_per_request_loads_every_time() {
        let (loader, loads) = CountingLoader::new(positive(), 0);
        let loader = build_model_loader(loader, LoadPolicy::PerRequest);
        for _ in 0..3 {
            analyze_sentiment(loader.as_ref(), "This is terrible.");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_shared_loads_once() {
        let (loader, loads) = CountingLoader::new(positive(), 0);
        let loader = build_model_loader(loader, LoadPolicy::Shared);
        for _ in 0..3 {
            analyze_sentiment(loader.as_ref(), "This is terrible.");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_retries_after_failure() {
        let (loader, loads) = CountingLoader::new(positive(), 1);
        let loader = CachedModelLoader::new(loader);
        assert!(analyze_sentiment(&loader, "a").starts_with(ANALYSIS_ERROR_PREFIX));
        assert!(analyze_sentiment(&loader, "a").starts_with("Text: a"));
        assert!(analyze_sentiment(&loader, "a").starts_with("Text: a"));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_loader_targets_sst2() {
        let loader = PretrainedModelLoader::default();
        assert_eq!(loader.get_identifier(), DEFAULT_SENTIMENT_MODEL);
        assert_eq!(LoadPolicy::default(), LoadPolicy::PerRequest);
    }
}
