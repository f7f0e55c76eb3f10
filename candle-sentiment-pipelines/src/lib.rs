pub mod sentiment_analysis;
pub mod text_classification;

pub use sentiment_analysis::{
    analyze_sentiment, build_model_loader, format_report, CachedModelLoader, LoadPolicy,
    ModelLoader, PretrainedModelLoader, TextClassifier, ANALYSIS_ERROR_PREFIX,
    DEFAULT_SENTIMENT_MODEL,
};
pub use text_classification::{postprocess_logits, TextClassificationPipeline};
