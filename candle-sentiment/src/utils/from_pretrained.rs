use hf_hub::{
    api::sync::{ApiBuilder, ApiRepo},
    Repo, RepoType,
};

use crate::{Error, Result};
use std::{fs, path::PathBuf};

pub const MODEL_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_REVISION: &str = "main";

/// Parameters used to resolve a repository on the Hugging Face Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromPretrainedParameters {
    pub revision: String,
    pub auth_token: Option<String>,
}

impl Default for FromPretrainedParameters {
    fn default() -> Self {
        Self {
            revision: DEFAULT_REVISION.into(),
            auth_token: None,
        }
    }
}

/// Gets a [`ApiRepo`] instance from the provided repository ID using the provided parameters. It
/// will check if the repository exists.
///
/// # Arguments
///
/// * `repo_id` - The repository ID.
/// * `params` - The parameters to use when creating the API instance.
///
/// # Returns
///
/// The API instance.
pub fn get_repo_api(repo_id: &str, params: Option<FromPretrainedParameters>) -> Result<ApiRepo> {
    let params = params.unwrap_or_default();
    let repo = Repo::with_revision(repo_id.to_string(), RepoType::Model, params.revision);

    let mut builder = ApiBuilder::new();
    if let Some(token) = params.auth_token {
        builder = builder.with_token(Some(token));
    }
    let api = builder.build()?.repo(repo);

    if api.info().is_err() && api.get(MODEL_CONFIG_FILE).is_err() {
        return Err(Error::RepositoryNotFound(repo_id.to_string()));
    }

    tracing::debug!("Resolved repository '{}' on the Hugging Face Hub", repo_id);

    Ok(api)
}

/// Loads the model configuration from the provided file path.
///
/// # Arguments
///
/// * `file_path` - The path to the `config.json` file containing the model configuration.
///
/// # Returns
///
/// The loaded model configuration.
pub fn load_model_config(file_path: PathBuf) -> Result<serde_json::Value> {
    let model_config = fs::read_to_string(file_path)?;
    let model_config = serde_json::from_str(&model_config)?;
    Ok(model_config)
}
