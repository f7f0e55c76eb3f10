use serde::{Deserialize, Serialize};

use crate::config::PretrainedConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HiddenAct {
    Gelu,
    Relu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistilBertConfig {
    pub vocab_size: usize,
    pub dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub hidden_dim: usize,
    pub activation: HiddenAct,
    pub max_position_embeddings: usize,
    pub dropout: f32,
    pub attention_dropout: f32,
    pub seq_classif_dropout: f32,
    pub model_type: Option<String>,

    #[serde(flatten)]
    pub pretrained_config: PretrainedConfig,
}

impl DistilBertConfig {
    pub const LAYER_NORM_EPS: f64 = 1e-12;
}

impl Default for DistilBertConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            dim: 768,
            n_layers: 6,
            n_heads: 12,
            hidden_dim: 3072,
            activation: HiddenAct::Gelu,
            max_position_embeddings: 512,
            dropout: 0.1,
            attention_dropout: 0.1,
            seq_classif_dropout: 0.2,
            model_type: Some("distilbert".to_string()),
            pretrained_config: PretrainedConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SST2_CONFIG: &str = r#"{
        "activation": "gelu",
        "architectures": ["DistilBertForSequenceClassification"],
        "attention_dropout": 0.1,
        "dim": 768,
        "dropout": 0.1,
        "finetuning_task": "sst-2",
        "hidden_dim": 3072,
        "id2label": {"0": "NEGATIVE", "1": "POSITIVE"},
        "initializer_range": 0.02,
        "label2id": {"NEGATIVE": 0, "POSITIVE": 1},
        "max_position_embeddings": 512,
        "model_type": "distilbert",
        "n_heads": 12,
        "n_layers": 6,
        "output_past": true,
        "pad_token_id": 0,
        "qa_dropout": 0.1,
        "seq_classif_dropout": 0.2,
        "sinusoidal_pos_embds": false,
        "tie_weights_": true,
        "vocab_size": 30522
    }"#;

    #[test]
    fn test_sst2_config() {
        let config: DistilBertConfig = serde_json::from_str(SST2_CONFIG).unwrap();
        assert_eq!(config.dim, 768);
        assert_eq!(config.n_layers, 6);
        assert_eq!(config.activation, HiddenAct::Gelu);
        assert_eq!(config.model_type.as_deref(), Some("distilbert"));
        assert_eq!(config.pretrained_config.num_labels(), 2);
        assert_eq!(config.pretrained_config.get_pad_token_id(), Some(0));
        assert_eq!(
            config.pretrained_config.get_id2label().unwrap()[&1],
            "POSITIVE"
        );
    }
}
