use candle_core::{DType, Device, Tensor};
use candle_sentiment::{bail, Error, FromPretrainedParameters, Result};
use tokenizers::{AddedToken, Tokenizer as CoreTokenizer};

use crate::encoding::BatchEncoding;
use crate::from_pretrained::{from_pretrained, TokenizerInfo};
use crate::tokenizers::distilbert::{DistilBertTokenizer, DistilBertTokenizerBuilder};

/// A thin wrapper around `tokenizers::Tokenizer` that provides additional functionality
/// for encoding sequences into tensors and to automatically load the tokenizer from a Hugging
/// Face Hub repository.
pub trait Tokenizer: std::fmt::Debug + Send + Sync {
    fn get_tokenizer(&self) -> &CoreTokenizer;

    fn get_max_length(&self) -> usize;
    fn get_cls_token(&self) -> Option<&str>;
    fn get_mask_token(&self) -> Option<&str>;
    fn get_pad_token(&self) -> Option<&str>;
    fn get_sep_token(&self) -> Option<&str>;
    fn get_unk_token(&self) -> Option<&str>;

    /// Get the token ID of a given token.
    ///
    /// # Arguments
    ///
    /// * `token` - A string slice representing the token.
    ///
    /// # Returns
    ///
    /// The token ID if the token exists in the tokenizer, `None` otherwise.
    fn get_token_id(&self, token: &str) -> Option<u32> {
        self.get_tokenizer().token_to_id(token)
    }

    /// Get the token ID of the CLS token.
    fn get_cls_token_id(&self) -> Option<u32> {
        self.get_token_id(self.get_cls_token()?)
    }

    /// Get the token ID of the PAD token.
    fn get_pad_token_id(&self) -> Option<u32> {
        self.get_token_id(self.get_pad_token()?)
    }

    /// Get the token ID of the SEP token.
    fn get_sep_token_id(&self) -> Option<u32> {
        self.get_token_id(self.get_sep_token()?)
    }

    /// Get the token ID of the UNK token.
    fn get_unk_token_id(&self) -> Option<u32> {
        self.get_token_id(self.get_unk_token()?)
    }

    /// Encodes a list of sequences. Sequences are padded to the longest one in the batch.
    ///
    /// # Arguments
    ///
    /// * `inputs` - A list of sequences to encode.
    /// * `add_special_tokens` - A flag indicating if special tokens should be added.
    ///
    /// # Returns
    ///
    /// A `BatchEncoding` containing the encoded sequences.
    fn encode(&self, inputs: Vec<String>, add_special_tokens: bool) -> Result<BatchEncoding> {
        let encodings = self
            .get_tokenizer()
            .encode_batch(inputs, add_special_tokens)
            .map_err(|e| Error::TokenizerEncodingError(e.to_string()))?;

        let mut input_ids: Vec<Vec<u32>> = Vec::new();
        let mut token_type_ids: Vec<Vec<u32>> = Vec::new();
        let mut attention_mask: Vec<Vec<u32>> = Vec::new();

        for encoding in &encodings {
            input_ids.push(encoding.get_ids().to_vec());
            token_type_ids.push(encoding.get_type_ids().to_vec());
            attention_mask.push(encoding.get_attention_mask().to_vec());
        }

        let input_ids = Tensor::new(input_ids, &Device::Cpu)?;
        let token_type_ids = Tensor::new(token_type_ids, &Device::Cpu)?;
        let attention_mask = Tensor::new(attention_mask, &Device::Cpu)?.to_dtype(DType::U8)?;

        Ok(BatchEncoding::new(input_ids, token_type_ids, attention_mask))
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.get_tokenizer()
            .decode(ids, skip_special_tokens)
            .map_err(|e| Error::TokenizerEncodingError(e.to_string()))
    }
}

/// A macro that implements the `Tokenizer` trait for a given tokenizer type.
#[macro_export]
macro_rules! impl_tokenizer {
    ($tokenizer_type:ty) => {
        impl $crate::tokenizer::Tokenizer for $tokenizer_type {
            fn get_tokenizer(&self) -> &tokenizers::Tokenizer {
                &self.tokenizer
            }

            fn get_max_length(&self) -> usize {
                self.max_length
            }

            fn get_cls_token(&self) -> Option<&str> {
                self.cls_token.as_deref()
            }

            fn get_mask_token(&self) -> Option<&str> {
                self.mask_token.as_deref()
            }

            fn get_pad_token(&self) -> Option<&str> {
                self.pad_token.as_deref()
            }

            fn get_sep_token(&self) -> Option<&str> {
                self.sep_token.as_deref()
            }

            fn get_unk_token(&self) -> Option<&str> {
                self.unk_token.as_deref()
            }
        }
    };
}

/// A trait that defines the methods required to build a `Tokenizer`.
pub trait TokenizerBuilder<T: Tokenizer> {
    fn new(tokenizer_info: TokenizerInfo) -> Self;
    fn get_tokenizer_info(&self) -> &TokenizerInfo;

    /// Builds the core tokenizer from the raw vocabulary files when no `tokenizer.json` exists.
    fn build_tokenizer(&mut self) -> Result<CoreTokenizer>;

    /// Wraps the core tokenizer, registering the special tokens and configuring padding.
    fn build_with_tokenizer(&self, tokenizer: CoreTokenizer) -> Result<T>;

    fn build(&mut self) -> Result<T> {
        let tokenizer_info = self.get_tokenizer_info();

        let added_tokens: Vec<AddedToken> = tokenizer_info
            .get_config()
            .and_then(|config| config.added_tokens_decoder.as_ref())
            .map(|decoder| decoder.values().cloned().collect())
            .unwrap_or_default();

        // Try to build from `tokenizer.json`. Otherwise, build from `vocab.txt`
        let tokenizer_file_path = tokenizer_info.tokenizer_file_path.clone();
        let mut tokenizer = match tokenizer_file_path {
            Some(tokenizer_file_path) => CoreTokenizer::from_file(tokenizer_file_path)
                .map_err(|e| Error::TokenizerBuildError(e.to_string()))?,
            None => self.build_tokenizer()?,
        };

        tokenizer.add_tokens(&added_tokens);

        self.build_with_tokenizer(tokenizer)
    }
}

/// Allows to automatically load a tokenizer from a Hugging Face Hub repository.
#[derive(Debug)]
pub struct AutoTokenizer {}

impl AutoTokenizer {
    /// Loads the tokenizer matching the tokenizer class of the repository.
    pub fn from_pretrained<S: AsRef<str>>(
        repo_id: S,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Box<dyn Tokenizer>> {
        let tokenizer_info = from_pretrained(repo_id, params)?;
        Self::from_tokenizer_info(tokenizer_info)
    }

    /// Builds the tokenizer matching the tokenizer class of already collected tokenizer files.
    pub fn from_tokenizer_info(tokenizer_info: TokenizerInfo) -> Result<Box<dyn Tokenizer>> {
        let tokenizer_class = tokenizer_info.get_tokenizer_class().to_string();
        tracing::debug!("Building tokenizer of class '{}'", tokenizer_class);

        match tokenizer_class.as_str() {
            "BertTokenizer" | "DistilBertTokenizer" => {
                DistilBertTokenizerBuilder::new(tokenizer_info)
                    .build()
                    .map(|tokenizer| Box::new(tokenizer) as Box<dyn Tokenizer>)
            }
            "" => bail!("Could not determine tokenizer class"),
            class => Err(Error::TokenizerNotImplemented(class.to_string())),
        }
    }
}

impl DistilBertTokenizer {
    pub fn from_pretrained<S: AsRef<str>>(
        repo_id: S,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let tokenizer_info = from_pretrained(repo_id, params)?;
        DistilBertTokenizerBuilder::new(tokenizer_info).build()
    }
}
