use std::{collections::HashMap, fs, path::PathBuf};

use candle_sentiment::{
    get_repo_api, load_model_config, utils::MODEL_CONFIG_FILE, FromPretrainedParameters, Result,
};
use lazy_static::lazy_static;
use serde::Deserialize;

use crate::config::{deserialize_token_content, TokenizerConfig};

const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const VOCAB_TXT_FILE: &str = "vocab.txt";
const SPECIAL_TOKENS_MAP_FILE: &str = "special_tokens_map.json";

/// Vocabulary of a WordPiece tokenizer, mapping each token to its id.
pub type Vocab = HashMap<String, u32>;

lazy_static! {
    static ref MODEL_TYPE_TO_TOKENIZER_CLASS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("bert", "BertTokenizer");
        map.insert("distilbert", "DistilBertTokenizer");
        map
    };
    static ref IGNORE_TOKENIZER_CLASSES: Vec<&'static str> = vec!["PreTrainedTokenizerFast"];
}

/// An enum representing the special tokens of a tokenizer.
pub enum SpecialTokenName {
    Cls,
    Mask,
    Pad,
    Sep,
    Unk,
}

/// The special tokens map of a tokenizer, loaded from `special_tokens_map.json`.
#[derive(Debug, Default, Deserialize)]
pub struct SpecialTokensMap {
    #[serde(deserialize_with = "deserialize_token_content", default)]
    cls_token: Option<String>,
    #[serde(deserialize_with = "deserialize_token_content", default)]
    mask_token: Option<String>,
    #[serde(deserialize_with = "deserialize_token_content", default)]
    pad_token: Option<String>,
    #[serde(deserialize_with = "deserialize_token_content", default)]
    sep_token: Option<String>,
    #[serde(deserialize_with = "deserialize_token_content", default)]
    unk_token: Option<String>,
}

impl SpecialTokensMap {
    fn get(&self, name: &SpecialTokenName) -> Option<&String> {
        match name {
            SpecialTokenName::Cls => self.cls_token.as_ref(),
            SpecialTokenName::Mask => self.mask_token.as_ref(),
            SpecialTokenName::Pad => self.pad_token.as_ref(),
            SpecialTokenName::Sep => self.sep_token.as_ref(),
            SpecialTokenName::Unk => self.unk_token.as_ref(),
        }
    }
}

/// A struct containing all the required information to load a tokenizer model.
#[derive(Debug, Default)]
pub struct TokenizerInfo {
    /// The configuration of the tokenizer.
    pub config: Option<TokenizerConfig>,
    /// The configuration of the model.
    pub model_config: Option<serde_json::Value>,
    /// The path to the `tokenizer.json` file if it exists.
    pub tokenizer_file_path: Option<PathBuf>,
    /// The vocabulary of the tokenizer.
    pub vocab: Option<Vocab>,
    /// The special tokens of the tokenizer.
    pub special_tokens_map: Option<SpecialTokensMap>,
}

impl TokenizerInfo {
    pub fn get_config(&self) -> Option<&TokenizerConfig> {
        self.config.as_ref()
    }

    /// Determines the tokenizer class. `tokenizer_class` from the tokenizer config wins, then the
    /// `model_type` of the model config is mapped to its default tokenizer class.
    pub fn get_tokenizer_class(&self) -> &str {
        if let Some(tokenizer_class) = self
            .config
            .as_ref()
            .and_then(|config| config.tokenizer_class.as_deref())
        {
            if !IGNORE_TOKENIZER_CLASSES.contains(&tokenizer_class) {
                return tokenizer_class.trim_end_matches("Fast");
            }
        }

        self.model_config
            .as_ref()
            .and_then(|model_config| model_config["model_type"].as_str())
            .and_then(|model_type| MODEL_TYPE_TO_TOKENIZER_CLASS.get(model_type))
            .copied()
            .unwrap_or("")
    }

    /// Gets the `String` representation of the CLS token.
    pub fn get_cls_token(&self) -> Option<String> {
        self.get_special_token(SpecialTokenName::Cls)
    }

    /// Gets the `String` representation of the MASK token.
    pub fn get_mask_token(&self) -> Option<String> {
        self.get_special_token(SpecialTokenName::Mask)
    }

    /// Gets the `String` representation of the PAD token.
    pub fn get_pad_token(&self) -> Option<String> {
        self.get_special_token(SpecialTokenName::Pad)
    }

    /// Gets the `String` representation of the SEP token.
    pub fn get_sep_token(&self) -> Option<String> {
        self.get_special_token(SpecialTokenName::Sep)
    }

    /// Gets the `String` representation of the UNK token.
    pub fn get_unk_token(&self) -> Option<String> {
        self.get_special_token(SpecialTokenName::Unk)
    }

    /// Gets the `String` representation of a special token. It will first try to get the token from
    /// the special tokens map and if it doesn't exist, it will try to get it from the config file.
    fn get_special_token(&self, special_token_name: SpecialTokenName) -> Option<String> {
        if let Some(token) = self
            .special_tokens_map
            .as_ref()
            .and_then(|map| map.get(&special_token_name))
        {
            return Some(token.clone());
        }

        let config = self.config.as_ref()?;
        match special_token_name {
            SpecialTokenName::Cls => config.cls_token.clone(),
            SpecialTokenName::Mask => config.mask_token.clone(),
            SpecialTokenName::Pad => config.pad_token.clone(),
            SpecialTokenName::Sep => config.sep_token.clone(),
            SpecialTokenName::Unk => config.unk_token.clone(),
        }
    }
}

/// Loads the vocabulary of the tokenizer model from a text file with one token per line.
pub fn load_vocab_txt(file_path: PathBuf) -> Result<Vocab> {
    Ok(parse_vocab_txt(&fs::read_to_string(file_path)?))
}

pub fn parse_vocab_txt(contents: &str) -> Vocab {
    contents
        .lines()
        .enumerate()
        .map(|(idx, line)| (line.to_string(), idx as u32))
        .collect()
}

/// Loads the special tokens map of the tokenizer model from a JSON file.
pub fn load_special_tokens_map(file_path: PathBuf) -> Result<SpecialTokensMap> {
    let special_tokens_map = fs::read_to_string(file_path)?;
    let special_tokens_map: SpecialTokensMap = serde_json::from_str(&special_tokens_map)?;
    Ok(special_tokens_map)
}

/// Gets all the information and files needed to load a tokenizer from a Hugging Face Hub
/// repository.
///
/// # Arguments
///
/// * `repo_id` - The ID of the repository to load the tokenizer from.
/// * `params` - Optional parameters to specify the revision and auth token.
///
/// # Returns
///
/// A `TokenizerInfo` struct containing all the information needed to load a tokenizer.
pub fn from_pretrained<I: AsRef<str>>(
    repo_id: I,
    params: Option<FromPretrainedParameters>,
) -> Result<TokenizerInfo> {
    let api = get_repo_api(repo_id.as_ref(), params)?;

    let config = match api.get(TOKENIZER_CONFIG_FILE) {
        Ok(tokenizer_config_file) => Some(TokenizerConfig::from_file(tokenizer_config_file)?),
        Err(_) => None,
    };

    // Used to determine the tokenizer class if the tokenizer config doesn't specify it
    let model_config = match api.get(MODEL_CONFIG_FILE) {
        Ok(model_config_file_path) => load_model_config(model_config_file_path).ok(),
        Err(_) => None,
    };

    let tokenizer_file_path = api.get(TOKENIZER_FILE).ok();

    let vocab = match api.get(VOCAB_TXT_FILE) {
        Ok(vocab_txt_file_path) => load_vocab_txt(vocab_txt_file_path).ok(),
        Err(_) => None,
    };

    let special_tokens_map = match api.get(SPECIAL_TOKENS_MAP_FILE) {
        Ok(special_tokens_map_file) => load_special_tokens_map(special_tokens_map_file).ok(),
        Err(_) => None,
    };

    Ok(TokenizerInfo {
        config,
        model_config,
        tokenizer_file_path,
        vocab,
        special_tokens_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_class_from_model_type() {
        let info = TokenizerInfo {
            config: Some(TokenizerConfig::default()),
            model_config: Some(serde_json::json!({"model_type": "distilbert"})),
            ..Default::default()
        };
        assert_eq!(info.get_tokenizer_class(), "DistilBertTokenizer");
    }

    #[test]
    fn test_tokenizer_class_from_config_wins() {
        let info = TokenizerInfo {
            config: Some(
                TokenizerConfig::from_json_str(r#"{"tokenizer_class": "BertTokenizerFast"}"#)
                    .unwrap(),
            ),
            model_config: Some(serde_json::json!({"model_type": "distilbert"})),
            ..Default::default()
        };
        assert_eq!(info.get_tokenizer_class(), "BertTokenizer");
    }

    #[test]
    fn test_unknown_tokenizer_class() {
        let info = TokenizerInfo {
            model_config: Some(serde_json::json!({"model_type": "gpt2"})),
            ..Default::default()
        };
        assert_eq!(info.get_tokenizer_class(), "");
    }

    #[test]
    fn test_special_tokens_map_before_config() {
        let info = TokenizerInfo {
            config: Some(TokenizerConfig::from_json_str(r#"{"pad_token": "<pad>"}"#).unwrap()),
            special_tokens_map: Some(
                serde_json::from_str(r#"{"pad_token": "[PAD]", "unk_token": "[UNK]"}"#).unwrap(),
            ),
            ..Default::default()
        };
        assert_eq!(info.get_pad_token().as_deref(), Some("[PAD]"));
        assert_eq!(info.get_unk_token().as_deref(), Some("[UNK]"));
        assert!(info.get_cls_token().is_none());
    }

    #[test]
    fn test_parse_vocab_txt() {
        let vocab = parse_vocab_txt("[PAD]\n[UNK]\nhello\n");
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab["[PAD]"], 0);
        assert_eq!(vocab["hello"], 2);
    }
}
