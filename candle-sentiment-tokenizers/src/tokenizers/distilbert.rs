use candle_sentiment::{Error, Result};
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::template::TemplateProcessing;
use tokenizers::{
    AddedToken, PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer as CoreTokenizer,
    TokenizerBuilder as CoreTokenizerBuilder,
};

use crate::config::TokenizerConfig;
use crate::from_pretrained::{TokenizerInfo, Vocab};
use crate::impl_tokenizer;
use crate::tokenizer::TokenizerBuilder;

const DISTILBERT_MAX_LENGTH: usize = 512;
const DISTILBERT_CLS_TOKEN: &str = "[CLS]";
const DISTILBERT_MASK_TOKEN: &str = "[MASK]";
const DISTILBERT_PAD_TOKEN: &str = "[PAD]";
const DISTILBERT_SEP_TOKEN: &str = "[SEP]";
const DISTILBERT_UNK_TOKEN: &str = "[UNK]";

/// WordPiece tokenizer used by the BERT family of checkpoints, DistilBERT included.
#[derive(Debug)]
pub struct DistilBertTokenizer {
    tokenizer: CoreTokenizer,
    max_length: usize,
    cls_token: Option<String>,
    mask_token: Option<String>,
    pad_token: Option<String>,
    sep_token: Option<String>,
    unk_token: Option<String>,
}

impl_tokenizer!(DistilBertTokenizer);

/// `DistilBertTokenizer` builder.
pub struct DistilBertTokenizerBuilder {
    tokenizer_info: TokenizerInfo,
}

impl DistilBertTokenizerBuilder {
    fn build_normalizer(&self, config: Option<&TokenizerConfig>) -> BertNormalizer {
        BertNormalizer::new(
            true,
            config.and_then(|c| c.tokenize_chinese_chars).unwrap_or(true),
            config.and_then(|c| c.strip_accents),
            config.and_then(|c| c.do_lower_case).unwrap_or(true),
        )
    }

    fn build_model(&self, vocab: Vocab, unk_token: String) -> Result<WordPiece> {
        WordPiece::builder()
            .vocab(vocab)
            .unk_token(unk_token)
            .continuing_subword_prefix("##".to_string())
            .max_input_chars_per_word(100)
            .build()
            .map_err(|e| Error::TokenizerBuildError(e.to_string()))
    }

    fn build_post_processor(
        &self,
        sep_token: (String, u32),
        cls_token: (String, u32),
    ) -> Result<TemplateProcessing> {
        TemplateProcessing::builder()
            .try_single(format!("{} $A {}", cls_token.0, sep_token.0))
            .map_err(Error::TokenizerBuildError)?
            .try_pair(format!(
                "{} $A:0 {} $B:1 {}:1",
                cls_token.0, sep_token.0, sep_token.0
            ))
            .map_err(Error::TokenizerBuildError)?
            .special_tokens(vec![cls_token, sep_token])
            .build()
            .map_err(|e| Error::TokenizerBuildError(e.to_string()))
    }

    fn build_decoder(&self) -> WordPieceDecoder {
        WordPieceDecoder::new("##".to_string(), true)
    }
}

impl TokenizerBuilder<DistilBertTokenizer> for DistilBertTokenizerBuilder {
    fn new(tokenizer_info: TokenizerInfo) -> Self {
        DistilBertTokenizerBuilder { tokenizer_info }
    }

    fn get_tokenizer_info(&self) -> &TokenizerInfo {
        &self.tokenizer_info
    }

    fn build_tokenizer(&mut self) -> Result<CoreTokenizer> {
        let vocab = self.tokenizer_info.vocab.take().ok_or_else(|| {
            Error::TokenizerBuildError(
                "Cannot build DistilBertTokenizer without 'vocab.txt'.".to_string(),
            )
        })?;
        let cls_token = self
            .tokenizer_info
            .get_cls_token()
            .unwrap_or(DISTILBERT_CLS_TOKEN.to_string());
        let sep_token = self
            .tokenizer_info
            .get_sep_token()
            .unwrap_or(DISTILBERT_SEP_TOKEN.to_string());
        let unk_token = self
            .tokenizer_info
            .get_unk_token()
            .unwrap_or(DISTILBERT_UNK_TOKEN.to_string());
        let cls_token_id = *vocab
            .get(&cls_token)
            .ok_or_else(|| Error::MissingSpecialTokenId(cls_token.clone()))?;
        let sep_token_id = *vocab
            .get(&sep_token)
            .ok_or_else(|| Error::MissingSpecialTokenId(sep_token.clone()))?;

        let tokenizer = CoreTokenizerBuilder::new()
            .with_model(self.build_model(vocab, unk_token)?)
            .with_normalizer(Some(self.build_normalizer(self.tokenizer_info.get_config())))
            .with_pre_tokenizer(Some(BertPreTokenizer))
            .with_post_processor(Some(self.build_post_processor(
                (sep_token, sep_token_id),
                (cls_token, cls_token_id),
            )?))
            .with_decoder(Some(self.build_decoder()))
            .build()
            .map_err(|e| Error::TokenizerBuildError(e.to_string()))?;

        Ok(CoreTokenizer::from(tokenizer))
    }

    fn build_with_tokenizer(&self, mut tokenizer: CoreTokenizer) -> Result<DistilBertTokenizer> {
        let max_length = self
            .tokenizer_info
            .get_config()
            .and_then(|config| config.model_max_length)
            .unwrap_or(DISTILBERT_MAX_LENGTH);
        let cls_token = self
            .tokenizer_info
            .get_cls_token()
            .unwrap_or(DISTILBERT_CLS_TOKEN.to_string());
        let mask_token = self
            .tokenizer_info
            .get_mask_token()
            .unwrap_or(DISTILBERT_MASK_TOKEN.to_string());
        let pad_token = self
            .tokenizer_info
            .get_pad_token()
            .unwrap_or(DISTILBERT_PAD_TOKEN.to_string());
        let sep_token = self
            .tokenizer_info
            .get_sep_token()
            .unwrap_or(DISTILBERT_SEP_TOKEN.to_string());
        let unk_token = self
            .tokenizer_info
            .get_unk_token()
            .unwrap_or(DISTILBERT_UNK_TOKEN.to_string());

        tokenizer.add_special_tokens(
            &[&cls_token, &mask_token, &pad_token, &sep_token, &unk_token]
                .map(|token| AddedToken::from(token.as_str(), true)),
        );

        let pad_id = tokenizer
            .token_to_id(&pad_token)
            .ok_or_else(|| Error::MissingSpecialTokenId(pad_token.clone()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            direction: PaddingDirection::Right,
            pad_to_multiple_of: None,
            pad_id,
            pad_type_id: 0,
            pad_token: pad_token.clone(),
        }));

        Ok(DistilBertTokenizer {
            tokenizer,
            max_length,
            cls_token: Some(cls_token),
            mask_token: Some(mask_token),
            pad_token: Some(pad_token),
            sep_token: Some(sep_token),
            unk_token: Some(unk_token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_pretrained::parse_vocab_txt;
    use crate::tokenizer::Tokenizer;

    const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nhello\nworld\n##s\ngreat\n";

    fn build_tokenizer(config: Option<&str>) -> DistilBertTokenizer {
        let tokenizer_info = TokenizerInfo {
            config: config.map(|c| TokenizerConfig::from_json_str(c).unwrap()),
            vocab: Some(parse_vocab_txt(VOCAB)),
            ..Default::default()
        };
        DistilBertTokenizerBuilder::new(tokenizer_info)
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_adds_special_tokens_and_lowercases() {
        let tokenizer = build_tokenizer(Some(r#"{"do_lower_case": true}"#));
        let encoding = tokenizer
            .encode(vec!["Hello Worlds".to_string()], true)
            .unwrap();
        let input_ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        assert_eq!(input_ids, vec![vec![2, 5, 6, 7, 3]]);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let tokenizer = build_tokenizer(None);
        let encoding = tokenizer
            .encode(vec!["hello banana".to_string()], true)
            .unwrap();
        let input_ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        assert_eq!(input_ids, vec![vec![2, 5, 1, 3]]);
    }

    #[test]
    fn test_empty_input_only_has_special_tokens() {
        let tokenizer = build_tokenizer(None);
        let encoding = tokenizer.encode(vec![String::new()], true).unwrap();
        let input_ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        assert_eq!(input_ids, vec![vec![2, 3]]);
    }

    #[test]
    fn test_batch_is_padded_to_longest() {
        let tokenizer = build_tokenizer(None);
        let encoding = tokenizer
            .encode(vec!["great".to_string(), "hello world".to_string()], true)
            .unwrap();
        let input_ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        let attention_mask = encoding.get_attention_mask().to_vec2::<u8>().unwrap();
        assert_eq!(input_ids, vec![vec![2, 8, 3, 0], vec![2, 5, 6, 3]]);
        assert_eq!(attention_mask, vec![vec![1, 1, 1, 0], vec![1, 1, 1, 1]]);
    }

    #[test]
    fn test_special_token_ids_and_defaults() {
        let tokenizer = build_tokenizer(None);
        assert_eq!(tokenizer.get_pad_token_id(), Some(0));
        assert_eq!(tokenizer.get_cls_token_id(), Some(2));
        assert_eq!(tokenizer.get_sep_token_id(), Some(3));
        assert_eq!(tokenizer.get_max_length(), 512);
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let tokenizer = build_tokenizer(None);
        let decoded = tokenizer.decode(&[2, 5, 6, 7, 3], true).unwrap();
        assert_eq!(decoded, "hello worlds");
    }

    #[test]
    fn test_missing_vocab_is_build_error() {
        let err = DistilBertTokenizerBuilder::new(TokenizerInfo::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TokenizerBuildError(_)));
    }
}
