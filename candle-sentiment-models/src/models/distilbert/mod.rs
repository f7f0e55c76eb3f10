pub mod config;
pub mod modeling;

pub use config::DistilBertConfig;
pub use modeling::{DistilBertForSequenceClassification, DistilBertModel, DISTILBERT_DTYPE};
