pub mod config;
pub mod from_pretrained;
pub mod model;
pub mod models;

pub use config::{PretrainedConfig, ProblemType};
pub use model::{AutoModelForSequenceClassification, ForwardParams, ModelOutput, PreTrainedModel};

// DistilBERT
pub use models::distilbert::{
    DistilBertConfig, DistilBertForSequenceClassification, DistilBertModel, DISTILBERT_DTYPE,
};
