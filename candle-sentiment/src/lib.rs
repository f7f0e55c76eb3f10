pub mod error;
pub mod utils;

pub use error::Error;
pub use utils::{get_repo_api, load_model_config, FromPretrainedParameters};

/// A type alias for `Result<T, Error>` for the `candle-sentiment` crates.
pub type Result<T> = std::result::Result<T, Error>;
