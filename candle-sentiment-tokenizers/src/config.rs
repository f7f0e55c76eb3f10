use std::collections::HashMap;

use candle_sentiment::{Error, Result};
use serde::{Deserialize, Deserializer};
use tokenizers::AddedToken;

/// Deserializes a special token that can be stored either as a plain string or as an
/// `AddedToken` object, keeping only its content.
pub(crate) fn deserialize_token_content<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Object(map)) => map
            .get("content")
            .and_then(|content| content.as_str())
            .map(str::to_string),
        _ => None,
    })
}

/// Deserializes `model_max_length`. Hub configs without a limit store a very large float
/// sentinel, which is read as `None`.
fn deserialize_max_length<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_u64)
        .and_then(|max_length| usize::try_from(max_length).ok()))
}

/// Tokenizer configuration loaded from `tokenizer_config.json`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenizerConfig {
    pub added_tokens_decoder: Option<HashMap<u32, AddedToken>>,
    #[serde(default, deserialize_with = "deserialize_token_content")]
    pub cls_token: Option<String>,
    pub do_lower_case: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_token_content")]
    pub mask_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_max_length")]
    pub model_max_length: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_token_content")]
    pub pad_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_token_content")]
    pub sep_token: Option<String>,
    pub strip_accents: Option<bool>,
    pub tokenize_chinese_chars: Option<bool>,
    pub tokenizer_class: Option<String>,
    #[serde(default, deserialize_with = "deserialize_token_content")]
    pub unk_token: Option<String>,
}

impl TokenizerConfig {
    /// Loads the tokenizer config from a `tokenizer_config.json` file.
    ///
    /// # Arguments
    ///
    /// * `file` - Path to the `tokenizer_config.json` file.
    ///
    /// # Returns
    ///
    /// The tokenizer configuration.
    pub fn from_file(file: std::path::PathBuf) -> Result<Self> {
        let config = std::fs::read_to_string(file)?;
        Self::from_json_str(&config)
    }

    pub fn from_json_str(config: &str) -> Result<Self> {
        serde_json::from_str(config).map_err(Error::wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::TokenizerConfig;

    #[test]
    fn test_sst2_tokenizer_config() {
        let config =
            TokenizerConfig::from_json_str(r#"{"model_max_length": 512, "do_lower_case": true}"#)
                .unwrap();
        assert_eq!(config.model_max_length, Some(512));
        assert_eq!(config.do_lower_case, Some(true));
        assert!(config.tokenizer_class.is_none());
        assert!(config.pad_token.is_none());
    }

    #[test]
    fn test_unbounded_model_max_length() {
        let config = TokenizerConfig::from_json_str(
            r#"{"do_lower_case": true, "model_max_length": 1000000000000000019884624838656}"#,
        )
        .unwrap();
        assert_eq!(config.model_max_length, None);
        assert_eq!(config.do_lower_case, Some(true));
    }

    #[test]
    fn test_special_tokens_as_strings_or_objects() {
        let config = TokenizerConfig::from_json_str(
            r#"{
                "cls_token": "[CLS]",
                "pad_token": {"content": "[PAD]", "lstrip": false, "rstrip": false},
                "tokenizer_class": "DistilBertTokenizer"
            }"#,
        )
        .unwrap();
        assert_eq!(config.cls_token.as_deref(), Some("[CLS]"));
        assert_eq!(config.pad_token.as_deref(), Some("[PAD]"));
        assert_eq!(
            config.tokenizer_class.as_deref(),
            Some("DistilBertTokenizer")
        );
    }
}
