pub mod from_pretrained;

pub use from_pretrained::{
    get_repo_api, load_model_config, FromPretrainedParameters, DEFAULT_REVISION,
    MODEL_CONFIG_FILE,
};
