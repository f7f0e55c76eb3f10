use std::{
    collections::{HashMap, HashSet},
    fs,
    path::PathBuf,
};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::ApiRepo;
use serde::{Deserialize, Serialize};

use candle_sentiment::{
    get_repo_api, load_model_config, utils::MODEL_CONFIG_FILE, Error, FromPretrainedParameters,
    Result,
};

const MODEL_SAFETENSORS_INDEX_FILE: &str = "model.safetensors.index.json";
const MODEL_SAFETENSORS_FILE: &str = "model.safetensors";
const MODEL_PYTORCH_FILE: &str = "pytorch_model.bin";

/// An struct holding all the information required to load a model from the Hugging Face Hub.
pub struct ModelInfo {
    /// The model configuration loaded from the `config.json` file.
    config: Option<serde_json::Value>,
    /// The paths to the model weights files.
    weights_file_paths: Vec<PathBuf>,
    /// A flag indicating whether the model weights are stored in PyTorch format.
    from_pth: bool,
}

impl ModelInfo {
    /// Loads the model weights from the provided paths into a `VarBuilder`.
    ///
    /// # Arguments
    ///
    /// - `dtype` - The data type of the model weights.
    /// - `device` - The device on which the model weights should be loaded.
    ///
    /// # Returns
    ///
    /// A `VarBuilder` containing the model weights.
    pub fn get_var_builder(&self, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
        let vb = match self.from_pth {
            true => {
                let path = self
                    .weights_file_paths
                    .first()
                    .ok_or(Error::ModelWeightsNotFound)?;
                VarBuilder::from_pth(path, dtype, device)?
            }
            // SAFETY: the weights files are not modified while the model is alive.
            false => unsafe {
                VarBuilder::from_mmaped_safetensors(&self.weights_file_paths, dtype, device)?
            },
        };
        Ok(vb)
    }

    /// Gets a reference to the model configuration.
    pub fn get_config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SafetensorsMetadata {
    total_size: usize,
}

/// Representation of the `model.safetensors.index.json` file which contains the metadata and
/// weight map of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SafetensorsIndex {
    metadata: SafetensorsMetadata,
    /// A map of the model weights, where the key is the layer name and the value is the file path
    /// to the `safetensors` file containing the weights of that layer.
    weight_map: HashMap<String, String>,
}

impl SafetensorsIndex {
    /// Gets the sorted list of `safetensors` files required to load the model.
    fn get_safetensors_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .weight_map
            .values()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        files.sort();
        files
    }
}

/// Loads the model weights from the Hugging Face Repository. It tries to first load the weights
/// from the `model.safetensors.index.json` file (and the corresponding `safetensors` files), then
/// from the `model.safetensors` file, and finally from the `pytorch_model.bin` file.
///
/// # Returns
///
/// A tuple containing the paths to the model weights files and a flag indicating whether the
/// weights are stored in PyTorch format.
fn load_model_weights(api: &ApiRepo) -> Result<(Vec<PathBuf>, bool)> {
    if let Ok(model_safetensors_index_file_path) = api.get(MODEL_SAFETENSORS_INDEX_FILE) {
        let safetensors_index = fs::read_to_string(model_safetensors_index_file_path)?;
        let safetensors_index: SafetensorsIndex = serde_json::from_str(&safetensors_index)?;
        let safetensors_files = safetensors_index
            .get_safetensors_files()
            .iter()
            .map(|file_name| api.get(file_name).map_err(Error::wrap))
            .collect::<Result<Vec<_>>>()?;
        return Ok((safetensors_files, false));
    }

    if let Ok(model_safetensor_file_path) = api.get(MODEL_SAFETENSORS_FILE) {
        return Ok((vec![model_safetensor_file_path], false));
    }

    if let Ok(model_pytorch_file_path) = api.get(MODEL_PYTORCH_FILE) {
        return Ok((vec![model_pytorch_file_path], true));
    }

    Err(Error::ModelWeightsNotFound)
}

/// Loads all the required configuration files for loading a model from the Hugging Face Hub.
///
/// # Arguments
///
/// * `repo_id`: The Hugging Face Hub model repository id.
/// * `params`: Optional parameters to specify the revision and auth token.
///
/// # Returns
///
/// A `ModelInfo` struct containing all the information required to load the model.
pub fn from_pretrained<I: AsRef<str>>(
    repo_id: I,
    params: Option<FromPretrainedParameters>,
) -> Result<ModelInfo> {
    let api = get_repo_api(repo_id.as_ref(), params)?;

    let config = match api.get(MODEL_CONFIG_FILE) {
        Ok(model_config_file_path) => Some(load_model_config(model_config_file_path)?),
        Err(_) => None,
    };

    let (weights_file_paths, from_pth) = load_model_weights(&api)?;

    tracing::debug!(
        "Found {} weights file(s) for '{}'",
        weights_file_paths.len(),
        repo_id.as_ref()
    );

    Ok(ModelInfo {
        config,
        weights_file_paths,
        from_pth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safetensors_index_files_are_deduplicated_and_sorted() {
        let index: SafetensorsIndex = serde_json::from_str(
            r#"{
                "metadata": {"total_size": 1024},
                "weight_map": {
                    "classifier.weight": "model-00002-of-00002.safetensors",
                    "classifier.bias": "model-00002-of-00002.safetensors",
                    "distilbert.embeddings.word_embeddings.weight": "model-00001-of-00002.safetensors"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            index.get_safetensors_files(),
            vec![
                "model-00001-of-00002.safetensors".to_string(),
                "model-00002-of-00002.safetensors".to_string()
            ]
        );
    }

    #[test]
    fn test_pth_without_files_is_error() {
        let info = ModelInfo {
            config: None,
            weights_file_paths: vec![],
            from_pth: true,
        };
        assert!(matches!(
            info.get_var_builder(DType::F32, &Device::Cpu),
            Err(Error::ModelWeightsNotFound)
        ));
    }
}
