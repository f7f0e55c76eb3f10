pub mod config;
pub mod encoding;
pub mod from_pretrained;
pub mod tokenizer;
pub mod tokenizers;

pub use encoding::BatchEncoding;
pub use from_pretrained::{from_pretrained, TokenizerInfo};
pub use tokenizer::{AutoTokenizer, Tokenizer, TokenizerBuilder};
pub use tokenizers::distilbert::{DistilBertTokenizer, DistilBertTokenizerBuilder};
