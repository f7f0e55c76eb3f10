use candle_core::{DType, IndexOp, Tensor, D};
use candle_nn::{
    embedding, layer_norm, linear, ops::softmax, Dropout, Embedding, LayerNorm, Linear, Module,
    VarBuilder,
};
use candle_sentiment::{Error, Result};

use super::config::{DistilBertConfig, HiddenAct};
use crate::{ForwardParams, ModelOutput, PreTrainedModel, PretrainedConfig};

pub const DISTILBERT_DTYPE: DType = DType::F32;

/// Smallest finite value used to mask attention scores for the given dtype.
fn min_value(dtype: DType) -> f64 {
    match dtype {
        DType::F16 => -65504.0,
        DType::BF16 => -3.38e38,
        _ => f32::MIN as f64,
    }
}

/// Converts a `(batch_size, seq_len)` mask of ones and zeros into an additive mask of shape
/// `(batch_size, 1, 1, seq_len)` that can be broadcasted over the attention scores.
pub(crate) fn get_extended_attention_mask(attention_mask: &Tensor, dtype: DType) -> Result<Tensor> {
    let (batch_size, seq_len) = attention_mask.dims2()?;
    let min = min_value(dtype);
    let mask = attention_mask
        .to_dtype(DType::F32)?
        .reshape((batch_size, 1, 1, seq_len))?
        .affine(-min, min)?
        .to_dtype(dtype)?;
    Ok(mask)
}

struct HiddenActLayer {
    act: HiddenAct,
}

impl HiddenActLayer {
    fn new(act: HiddenAct) -> Self {
        Self { act }
    }

    fn forward(&self, hidden_states: &Tensor) -> candle_core::Result<Tensor> {
        match self.act {
            HiddenAct::Gelu => hidden_states.gelu_erf(),
            HiddenAct::Relu => hidden_states.relu(),
        }
    }
}

pub struct DistilBertEmbeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    layer_norm: LayerNorm,
    dropout: Dropout,
    max_position_embeddings: usize,
}

impl DistilBertEmbeddings {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        let word_embeddings =
            embedding(config.vocab_size, config.dim, vb.pp("word_embeddings"))?;
        let position_embeddings = embedding(
            config.max_position_embeddings,
            config.dim,
            vb.pp("position_embeddings"),
        )?;
        let layer_norm = layer_norm(
            config.dim,
            DistilBertConfig::LAYER_NORM_EPS,
            vb.pp("LayerNorm"),
        )?;
        Ok(Self {
            word_embeddings,
            position_embeddings,
            layer_norm,
            dropout: Dropout::new(config.dropout),
            max_position_embeddings: config.max_position_embeddings,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_bsize, seq_len) = input_ids.dims2()?;
        if seq_len > self.max_position_embeddings {
            return Err(Error::SequenceTooLong(
                seq_len,
                self.max_position_embeddings,
            ));
        }
        let input_embeddings = self.word_embeddings.forward(input_ids)?;
        let position_ids = (0..seq_len as u32).collect::<Vec<_>>();
        let position_ids = Tensor::new(&position_ids[..], input_ids.device())?;
        let embeddings =
            input_embeddings.broadcast_add(&self.position_embeddings.forward(&position_ids)?)?;
        let embeddings = self.layer_norm.forward(&embeddings)?;
        let embeddings = self.dropout.forward(&embeddings, false)?;
        Ok(embeddings)
    }
}

pub struct DistilBertSelfAttention {
    q_lin: Linear,
    k_lin: Linear,
    v_lin: Linear,
    out_lin: Linear,
    dropout: Dropout,
    n_heads: usize,
    head_dim: usize,
}

impl DistilBertSelfAttention {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        if config.dim % config.n_heads != 0 {
            return Err(Error::msg(format!(
                "dim {} is not a multiple of n_heads {}",
                config.dim, config.n_heads
            )));
        }
        let dim = config.dim;
        Ok(Self {
            q_lin: linear(dim, dim, vb.pp("q_lin"))?,
            k_lin: linear(dim, dim, vb.pp("k_lin"))?,
            v_lin: linear(dim, dim, vb.pp("v_lin"))?,
            out_lin: linear(dim, dim, vb.pp("out_lin"))?,
            dropout: Dropout::new(config.attention_dropout),
            n_heads: config.n_heads,
            head_dim: dim / config.n_heads,
        })
    }

    /// `(batch_size, seq_len, dim)` -> `(batch_size, n_heads, seq_len, head_dim)`
    fn shape(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (batch_size, seq_len, _) = xs.dims3()?;
        xs.reshape((batch_size, seq_len, self.n_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let query_layer = self.shape(&self.q_lin.forward(hidden_states)?)?;
        let key_layer = self.shape(&self.k_lin.forward(hidden_states)?)?;
        let value_layer = self.shape(&self.v_lin.forward(hidden_states)?)?;

        let query_layer = (query_layer / (self.head_dim as f64).sqrt())?;
        let attention_scores = query_layer.matmul(&key_layer.t()?)?;
        let attention_scores = attention_scores.broadcast_add(attention_mask)?;
        let attention_probs = softmax(&attention_scores, D::Minus1)?;
        let attention_probs = self.dropout.forward(&attention_probs, false)?;

        let context_layer = attention_probs.matmul(&value_layer)?;
        let context_layer = context_layer
            .transpose(1, 2)?
            .contiguous()?
            .flatten_from(D::Minus2)?;
        Ok(self.out_lin.forward(&context_layer)?)
    }
}

pub struct DistilBertFeedForward {
    lin1: Linear,
    lin2: Linear,
    activation: HiddenActLayer,
    dropout: Dropout,
}

impl DistilBertFeedForward {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        Ok(Self {
            lin1: linear(config.dim, config.hidden_dim, vb.pp("lin1"))?,
            lin2: linear(config.hidden_dim, config.dim, vb.pp("lin2"))?,
            activation: HiddenActLayer::new(config.activation),
            dropout: Dropout::new(config.dropout),
        })
    }
}

impl Module for DistilBertFeedForward {
    fn forward(&self, hidden_states: &Tensor) -> candle_core::Result<Tensor> {
        let hidden_states = self.lin1.forward(hidden_states)?;
        let hidden_states = self.activation.forward(&hidden_states)?;
        let hidden_states = self.lin2.forward(&hidden_states)?;
        self.dropout.forward(&hidden_states, false)
    }
}

pub struct DistilBertLayer {
    attention: DistilBertSelfAttention,
    sa_layer_norm: LayerNorm,
    ffn: DistilBertFeedForward,
    output_layer_norm: LayerNorm,
}

impl DistilBertLayer {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        Ok(Self {
            attention: DistilBertSelfAttention::load(vb.pp("attention"), config)?,
            sa_layer_norm: layer_norm(
                config.dim,
                DistilBertConfig::LAYER_NORM_EPS,
                vb.pp("sa_layer_norm"),
            )?,
            ffn: DistilBertFeedForward::load(vb.pp("ffn"), config)?,
            output_layer_norm: layer_norm(
                config.dim,
                DistilBertConfig::LAYER_NORM_EPS,
                vb.pp("output_layer_norm"),
            )?,
        })
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let attention_output = self.attention.forward(hidden_states, attention_mask)?;
        let attention_output = self
            .sa_layer_norm
            .forward(&(attention_output + hidden_states)?)?;
        let ffn_output = self.ffn.forward(&attention_output)?;
        let layer_output = self
            .output_layer_norm
            .forward(&(ffn_output + attention_output)?)?;
        Ok(layer_output)
    }
}

pub struct DistilBertTransformer {
    layers: Vec<DistilBertLayer>,
}

impl DistilBertTransformer {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        let layers = (0..config.n_layers)
            .map(|index| DistilBertLayer::load(vb.pp(format!("layer.{index}")), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mut hidden_states = hidden_states.clone();
        for layer in self.layers.iter() {
            hidden_states = layer.forward(&hidden_states, attention_mask)?;
        }
        Ok(hidden_states)
    }
}

pub struct DistilBert {
    embeddings: DistilBertEmbeddings,
    transformer: DistilBertTransformer,
}

impl DistilBert {
    pub fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        let embeddings = DistilBertEmbeddings::load(vb.pp("embeddings"), config)?;
        let transformer = DistilBertTransformer::load(vb.pp("transformer"), config)?;
        Ok(Self {
            embeddings,
            transformer,
        })
    }

    /// Runs the encoder and returns the last hidden state `(batch_size, seq_len, dim)`.
    pub fn forward(&self, input_ids: &Tensor, attention_mask: Option<&Tensor>) -> Result<Tensor> {
        let embedding_output = self.embeddings.forward(input_ids)?;
        let attention_mask = match attention_mask {
            Some(attention_mask) => attention_mask.clone(),
            None => input_ids.ones_like()?,
        };
        let attention_mask =
            get_extended_attention_mask(&attention_mask, embedding_output.dtype())?;
        self.transformer.forward(&embedding_output, &attention_mask)
    }
}

fn get_input_ids<'a>(params: &ForwardParams<'a>) -> Result<&'a Tensor> {
    params
        .get_input_ids()
        .ok_or_else(|| Error::MissingForwardParam("input_ids".to_string()))
}

pub struct DistilBertModel {
    model: DistilBert,
    config: DistilBertConfig,
}

impl PreTrainedModel for DistilBertModel {
    fn load(vb: VarBuilder, config: serde_json::Value) -> Result<Self> {
        let config: DistilBertConfig = serde_json::from_value(config)?;
        // Base checkpoints store the encoder at the root, task checkpoints under `distilbert`
        let vb = if vb.contains_tensor("distilbert.embeddings.word_embeddings.weight") {
            vb.pp("distilbert")
        } else {
            vb
        };
        let model = DistilBert::load(vb, &config)?;
        Ok(Self { model, config })
    }

    fn get_config(&self) -> &PretrainedConfig {
        &self.config.pretrained_config
    }

    fn forward(&self, params: ForwardParams) -> Result<ModelOutput> {
        let last_hidden_state = self
            .model
            .forward(get_input_ids(&params)?, params.get_attention_mask())?;
        Ok(ModelOutput::new(Some(last_hidden_state), None))
    }
}

pub struct DistilBertForSequenceClassification {
    model: DistilBert,
    pre_classifier: Linear,
    dropout: Dropout,
    classifier: Linear,
    config: DistilBertConfig,
}

impl PreTrainedModel for DistilBertForSequenceClassification {
    fn load(vb: VarBuilder, config: serde_json::Value) -> Result<Self> {
        let config: DistilBertConfig = serde_json::from_value(config)?;
        let num_labels = config.pretrained_config.num_labels();
        if num_labels == 0 {
            return Err(Error::msg(
                "Model config has no `id2label`, cannot build a classification head",
            ));
        }
        let model = DistilBert::load(vb.pp("distilbert"), &config)?;
        let pre_classifier = linear(config.dim, config.dim, vb.pp("pre_classifier"))?;
        let dropout = Dropout::new(config.seq_classif_dropout);
        let classifier = linear(config.dim, num_labels, vb.pp("classifier"))?;

        Ok(Self {
            model,
            pre_classifier,
            dropout,
            classifier,
            config,
        })
    }

    fn get_config(&self) -> &PretrainedConfig {
        &self.config.pretrained_config
    }

    fn forward(&self, params: ForwardParams) -> Result<ModelOutput> {
        let last_hidden_state = self
            .model
            .forward(get_input_ids(&params)?, params.get_attention_mask())?;
        let pooled_output = last_hidden_state.i((.., 0))?;
        let pooled_output = self.pre_classifier.forward(&pooled_output)?.relu()?;
        let pooled_output = self.dropout.forward(&pooled_output, false)?;
        let logits = self.classifier.forward(&pooled_output)?;
        Ok(ModelOutput::new(Some(last_hidden_state), Some(logits)))
    }
}
