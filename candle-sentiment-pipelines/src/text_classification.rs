use candle_core::{DType, Device, Tensor, D};
use candle_nn::ops::{sigmoid, softmax};
use candle_sentiment::{Error, FromPretrainedParameters, Result};
use candle_sentiment_models::{
    AutoModelForSequenceClassification, ForwardParams, PreTrainedModel, PretrainedConfig,
    ProblemType,
};
use candle_sentiment_tokenizers::{AutoTokenizer, BatchEncoding, Tokenizer};

/// Converts the logits of a sequence classification model into `(label, score)` pairs sorted
/// by descending score.
///
/// # Arguments
///
/// * `logits` - A `(batch_size, num_labels)` tensor.
/// * `config` - The configuration of the model that produced the logits.
/// * `top_k` - If set, only the `top_k` best scoring labels are kept for each sequence.
///
/// # Returns
///
/// A list with the scored labels of each sequence in the batch.
pub fn postprocess_logits(
    logits: &Tensor,
    config: &PretrainedConfig,
    top_k: Option<usize>,
) -> Result<Vec<Vec<(String, f32)>>> {
    let id2label = config
        .get_id2label()
        .ok_or_else(|| Error::msg("id2label not found in model config"))?;

    let problem_type = config.get_problem_type();
    let scores = {
        if *problem_type == ProblemType::Regression {
            logits.clone()
        } else if *problem_type == ProblemType::MultiLabelClassification
            || config.num_labels() == 1
        {
            sigmoid(logits)?
        } else {
            softmax(logits, D::Minus1)?
        }
    }
    .to_dtype(DType::F32)?
    .to_vec2::<f32>()?;

    let mut results = Vec::with_capacity(scores.len());
    for inner in &scores {
        let mut scores_with_labels = inner
            .iter()
            .enumerate()
            .map(|(i, score)| {
                id2label
                    .get(&i)
                    .map(|label| (label.to_string(), *score))
                    .ok_or_else(|| Error::msg(format!("label id {i} not found in id2label")))
            })
            .collect::<Result<Vec<(String, f32)>>>()?;
        scores_with_labels.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(top_k) = top_k {
            scores_with_labels.truncate(top_k);
        }
        results.push(scores_with_labels);
    }
    Ok(results)
}

/// A pipeline for doing text classification.
pub struct TextClassificationPipeline {
    model: Box<dyn PreTrainedModel>,
    tokenizer: Box<dyn Tokenizer>,
    device: Device,
}

impl TextClassificationPipeline {
    /// Creates a new `TextClassificationPipeline`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The repository id of the model to load.
    /// * `device` - The device to run the model on.
    /// * `dtype` - The dtype of the model weights. The model default is used if `None`.
    /// * `params` - Optional parameters to specify the revision and auth token.
    ///
    /// # Returns
    ///
    /// The `TextClassificationPipeline` instance.
    pub fn new<S: AsRef<str> + Copy>(
        identifier: S,
        device: &Device,
        dtype: Option<DType>,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let model = AutoModelForSequenceClassification::from_pretrained(
            identifier,
            device,
            dtype,
            params.clone(),
        )?;
        let tokenizer = AutoTokenizer::from_pretrained(identifier, params)?;
        Ok(Self::from_parts(model, tokenizer, device))
    }

    /// Creates the pipeline from an already loaded model and tokenizer.
    pub fn from_parts(
        model: Box<dyn PreTrainedModel>,
        tokenizer: Box<dyn Tokenizer>,
        device: &Device,
    ) -> Self {
        Self {
            model,
            tokenizer,
            device: device.clone(),
        }
    }

    fn preprocess(&self, inputs: Vec<String>) -> Result<BatchEncoding> {
        let mut encodings = self.tokenizer.encode(inputs, true)?;
        encodings.to_device(&self.device)?;
        Ok(encodings)
    }

    fn forward(&self, inputs: Vec<String>, top_k: Option<usize>) -> Result<Vec<Vec<(String, f32)>>> {
        let encodings = self.preprocess(inputs)?;
        let output = self.model.forward(ForwardParams::from(&encodings))?;
        let logits = output
            .get_logits()
            .ok_or_else(|| Error::msg("model did not return logits"))?;
        postprocess_logits(logits, self.model.get_config(), top_k)
    }

    /// Classifies a single sequence.
    ///
    /// # Arguments
    ///
    /// * `input` - The input sequence to classify.
    /// * `top_k` - If set, only the `top_k` best scoring labels are returned.
    ///
    /// # Returns
    ///
    /// A list containing the predicted labels and their scores.
    pub fn run<I: Into<String>>(
        &self,
        input: I,
        top_k: Option<usize>,
    ) -> Result<Vec<(String, f32)>> {
        self.forward(vec![input.into()], top_k)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::msg("pipeline returned no results"))
    }

    /// Classifies a list of sequences.
    ///
    /// # Arguments
    ///
    /// * `inputs` - The input sequences to classify.
    /// * `top_k` - If set, only the `top_k` best scoring labels are returned for each sequence.
    ///
    /// # Returns
    ///
    /// A list containing the predicted labels and their scores for each sequence.
    pub fn run_batch<I: Into<String>>(
        &self,
        inputs: Vec<I>,
        top_k: Option<usize>,
    ) -> Result<Vec<Vec<(String, f32)>>> {
        let inputs: Vec<String> = inputs.into_iter().map(|x| x.into()).collect();
        self.forward(inputs, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarBuilder;
    use candle_sentiment_models::DistilBertForSequenceClassification;
    use candle_sentiment_tokenizers::{
        from_pretrained::parse_vocab_txt, DistilBertTokenizerBuilder, TokenizerBuilder,
        TokenizerInfo,
    };

    fn config(json: &str) -> PretrainedConfig {
        serde_json::from_str(json).unwrap()
    }

    fn sst2_config() -> PretrainedConfig {
        config(r#"{"id2label": {"0": "NEGATIVE", "1": "POSITIVE"}}"#)
    }

    #[test]
    fn test_softmax_scores_are_sorted() {
        let logits = Tensor::new(&[[0.0f32, 2.0], [1.0, -1.0]], &Device::Cpu).unwrap();
        let results = postprocess_logits(&logits, &sst2_config(), None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0][0].0, "POSITIVE");
        assert!((results[0][0].1 - 0.8808).abs() < 1e-4);
        assert!((results[0][0].1 + results[0][1].1 - 1.0).abs() < 1e-5);
        assert_eq!(results[1][0].0, "NEGATIVE");
    }

    #[test]
    fn test_top_k_truncates() {
        let logits = Tensor::new(&[[0.0f32, 2.0]], &Device::Cpu).unwrap();
        let results = postprocess_logits(&logits, &sst2_config(), Some(1)).unwrap();
        assert_eq!(results[0].len(), 1);
        assert_eq!(results[0][0].0, "POSITIVE");
    }

    #[test]
    fn test_multi_label_uses_sigmoid() {
        let config = config(
            r#"{"problem_type": "multi_label_classification",
                "id2label": {"0": "joy", "1": "anger"}}"#,
        );
        let logits = Tensor::new(&[[0.0f32, 0.0]], &Device::Cpu).unwrap();
        let results = postprocess_logits(&logits, &config, None).unwrap();
        assert!(results[0].iter().all(|(_, score)| (score - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_regression_keeps_raw_logits() {
        let config = config(r#"{"problem_type": "regression", "id2label": {"0": "stars"}}"#);
        let logits = Tensor::new(&[[3.5f32]], &Device::Cpu).unwrap();
        let results = postprocess_logits(&logits, &config, None).unwrap();
        assert_eq!(results[0], vec![("stars".to_string(), 3.5)]);
    }

    #[test]
    fn test_missing_id2label_is_error() {
        let logits = Tensor::new(&[[0.0f32, 1.0]], &Device::Cpu).unwrap();
        assert!(postprocess_logits(&logits, &config("{}"), None).is_err());
    }

    #[test]
    fn test_unknown_label_id_is_error() {
        let config = config(r#"{"id2label": {"0": "NEGATIVE", "2": "POSITIVE"}}"#);
        let logits = Tensor::new(&[[0.0f32, 1.0]], &Device::Cpu).unwrap();
        let err = postprocess_logits(&logits, &config, None).unwrap_err();
        assert!(err.to_string().contains("label id 1"));
    }

    fn zero_weights_pipeline() -> TextClassificationPipeline {
        let model_config = serde_json::json!({
            "activation": "gelu",
            "attention_dropout": 0.1,
            "dim": 8,
            "dropout": 0.1,
            "hidden_dim": 16,
            "id2label": {"0": "NEGATIVE", "1": "POSITIVE"},
            "initializer_range": 0.02,
            "max_position_embeddings": 8,
            "model_type": "distilbert",
            "n_heads": 2,
            "n_layers": 1,
            "pad_token_id": 0,
            "seq_classif_dropout": 0.2,
            "vocab_size": 10
        });
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = DistilBertForSequenceClassification::load(vb, model_config).unwrap();
        let tokenizer_info = TokenizerInfo {
            vocab: Some(parse_vocab_txt(
                "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nhello\nworld\n##s\ngreat\n",
            )),
            ..Default::default()
        };
        let tokenizer = DistilBertTokenizerBuilder::new(tokenizer_info)
            .build()
            .unwrap();
        TextClassificationPipeline::from_parts(Box::new(model), Box::new(tokenizer), &Device::Cpu)
    }

    #[test]
    fn test_run_with_zero_weights() {
        let pipeline = zero_weights_pipeline();
        let results = pipeline.run("hello world", None).unwrap();
        assert_eq!(results.len(), 2);
        for (_, score) in &results {
            assert!((score - 0.5).abs() < 1e-6);
        }
        let results = pipeline.run("hello world", Some(1)).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_run_batch_and_too_long_input() {
        let pipeline = zero_weights_pipeline();
        let results = pipeline.run_batch(vec!["great", "hello world"], Some(1)).unwrap();
        assert_eq!(results.len(), 2);

        let err = pipeline
            .run("hello hello hello hello hello hello hello", None)
            .unwrap_err();
        assert!(matches!(err, Error::SequenceTooLong(9, 8)));
    }
}
