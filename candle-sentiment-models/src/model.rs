use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_sentiment::{Error, FromPretrainedParameters, Result};

use crate::config::PretrainedConfig;
use crate::from_pretrained::from_pretrained;
use crate::models::distilbert::{
    DistilBertForSequenceClassification, DistilBertModel, DISTILBERT_DTYPE,
};

/// Parameters for the `forward` method of a `PreTrainedModel`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardParams<'a> {
    pub input_ids: Option<&'a Tensor>,
    pub attention_mask: Option<&'a Tensor>,
    pub token_type_ids: Option<&'a Tensor>,
}

impl<'a> ForwardParams<'a> {
    pub fn new(
        input_ids: Option<&'a Tensor>,
        attention_mask: Option<&'a Tensor>,
        token_type_ids: Option<&'a Tensor>,
    ) -> Self {
        Self {
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    pub fn get_input_ids(&self) -> Option<&'a Tensor> {
        self.input_ids
    }

    pub fn get_attention_mask(&self) -> Option<&'a Tensor> {
        self.attention_mask
    }

    pub fn get_token_type_ids(&self) -> Option<&'a Tensor> {
        self.token_type_ids
    }
}

#[cfg(feature = "tokenizers")]
impl<'a> From<&'a candle_sentiment_tokenizers::BatchEncoding> for ForwardParams<'a> {
    fn from(encodings: &'a candle_sentiment_tokenizers::BatchEncoding) -> Self {
        Self::new(
            Some(encodings.get_input_ids()),
            Some(encodings.get_attention_mask()),
            Some(encodings.get_token_type_ids()),
        )
    }
}

/// The output of the `forward` method of a `PreTrainedModel`.
#[derive(Debug, Default)]
pub struct ModelOutput {
    last_hidden_state: Option<Tensor>,
    logits: Option<Tensor>,
}

impl ModelOutput {
    pub fn new(last_hidden_state: Option<Tensor>, logits: Option<Tensor>) -> Self {
        Self {
            last_hidden_state,
            logits,
        }
    }

    pub fn get_last_hidden_state(&self) -> Option<&Tensor> {
        self.last_hidden_state.as_ref()
    }

    pub fn get_logits(&self) -> Option<&Tensor> {
        self.logits.as_ref()
    }
}

/// Trait for a pre-trained model.
pub trait PreTrainedModel: Send + Sync {
    fn load(vb: VarBuilder, config: serde_json::Value) -> Result<Self>
    where
        Self: Sized;
    fn get_config(&self) -> &PretrainedConfig;
    fn forward(&self, params: ForwardParams) -> Result<ModelOutput>;
}

/// Implement `from_pretrained` method for a model struct.
#[macro_export]
macro_rules! impl_from_pretrained_method {
    ($model_struct:ident, $default_dtype:expr) => {
        impl $model_struct {
            /// Loads a model from the Hugging Face Hub.
            ///
            /// # Arguments
            ///
            /// * `repo_id` - The repository id of the model to load.
            /// * `device` - The device to run the model on.
            /// * `dtype` - The numeric type in which the model parameters should be loaded.
            /// * `params` - Optional parameters to specify the revision and auth token.
            ///
            /// # Returns
            ///
            /// The loaded model.
            pub fn from_pretrained<S: AsRef<str>>(
                repo_id: S,
                device: &Device,
                dtype: Option<DType>,
                params: Option<FromPretrainedParameters>,
            ) -> Result<Self> {
                let model_info = from_pretrained(repo_id, params)?;
                let config = model_info
                    .get_config()
                    .ok_or(Error::ModelConfigNotFound)?
                    .clone();
                let dtype = dtype.unwrap_or($default_dtype);
                let vb = model_info.get_var_builder(dtype, device)?;
                Self::load(vb, config)
            }
        }
    };
}

/// Implement `from_pretrained` method for the `AutoModel` struct.
#[macro_export]
macro_rules! impl_auto_model_from_pretrained_method {
    ($auto_model_struct:ident, $(($model_type:expr, $model_struct:ident, $default_dtype:expr)), *) => {
        impl $auto_model_struct {
            /// Loads a model from the Hugging Face Hub, choosing the implementation from the
            /// `model_type` of its configuration.
            ///
            /// # Arguments
            ///
            /// * `repo_id` - The repository id of the model to load.
            /// * `device` - The device to run the model on.
            /// * `dtype` - The numeric type in which the model parameters should be loaded.
            /// * `params` - Optional parameters to specify the revision and auth token.
            ///
            /// # Returns
            ///
            /// The loaded model.
            pub fn from_pretrained<S: AsRef<str>>(
                repo_id: S,
                device: &Device,
                dtype: Option<DType>,
                params: Option<FromPretrainedParameters>,
            ) -> Result<Box<dyn PreTrainedModel>> {
                let model_info = from_pretrained(repo_id, params)?;
                let config = model_info
                    .get_config()
                    .ok_or(Error::ModelConfigNotFound)?
                    .clone();
                let model_type = config["model_type"].as_str().unwrap_or_default().to_string();

                match model_type.as_str() {
                    $(
                        $model_type => {
                            let dtype = dtype.unwrap_or($default_dtype);
                            let vb = model_info.get_var_builder(dtype, device)?;
                            Ok(Box::new($model_struct::load(vb, config)?))
                        },
                    )*
                    _ => Err(Error::ModelNotImplemented(model_type)),
                }
            }
        }
    };
}

/// Alows to automatically load a `PreTrainedModel` for sequence classification from a Hugging Face
/// Hub repository.
#[derive(Debug)]
pub struct AutoModelForSequenceClassification {}

impl_auto_model_from_pretrained_method!(
    AutoModelForSequenceClassification,
    ("distilbert", DistilBertForSequenceClassification, DISTILBERT_DTYPE)
);

// DistilBERT
impl_from_pretrained_method!(DistilBertModel, DISTILBERT_DTYPE);
impl_from_pretrained_method!(DistilBertForSequenceClassification, DISTILBERT_DTYPE);
