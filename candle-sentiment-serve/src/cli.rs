use anyhow::{anyhow, Result};
use candle_core::{DType, Device};
use candle_sentiment::FromPretrainedParameters;
use candle_sentiment_pipelines::{LoadPolicy, DEFAULT_SENTIMENT_MODEL};
use clap::Parser;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// The host to listen on.
    #[arg(long, env = "SENTIMENT_HOST", default_value = "127.0.0.1:7860")]
    host: String,

    /// The Hugging Face repository id of the sentiment model to be loaded.
    #[arg(short, long, env = "SENTIMENT_MODEL", default_value = DEFAULT_SENTIMENT_MODEL)]
    model: String,

    /// The revision of the model repository.
    #[arg(long, env = "SENTIMENT_REVISION", default_value = "main")]
    revision: String,

    /// The device to run the pipeline on.
    #[arg(short, long, env = "SENTIMENT_DEVICE", value_parser = parse_device, default_value = "cpu")]
    device: DeviceOption,

    /// The dtype to load the model weights with.
    #[arg(long, env = "SENTIMENT_DTYPE")]
    dtype: Option<DTypeOption>,

    /// The number of workers to use for inference.
    #[arg(long, env = "SENTIMENT_NUM_WORKERS", default_value = "1")]
    num_workers: usize,

    /// Whether the model is loaded for every request or once and shared.
    #[arg(long, env = "SENTIMENT_LOAD_POLICY", default_value = "per-request")]
    load_policy: LoadPolicyOption,
}

impl Cli {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn from_pretrained_params(&self) -> FromPretrainedParameters {
        FromPretrainedParameters {
            revision: self.revision.clone(),
            ..Default::default()
        }
    }

    /// Get the [`candle_core::Device`] corresponding to the selected device option.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested device is not available.
    pub fn device(&self) -> Result<Device> {
        match self.device {
            DeviceOption::Cuda(device_id) if cfg!(feature = "cuda") => {
                Ok(Device::new_cuda(device_id)?)
            }
            DeviceOption::Metal if cfg!(feature = "metal") => Ok(Device::new_metal(0)?),
            DeviceOption::Cpu => Ok(Device::Cpu),
            _ => Err(anyhow!("Requested device is not available")),
        }
    }

    /// Get the [`candle_core::DType`] corresponding to the selected dtype option.
    pub fn dtype(&self) -> Option<DType> {
        self.dtype.as_ref().map(|dtype| match dtype {
            DTypeOption::Float16 => DType::F16,
            DTypeOption::BFloat16 => DType::BF16,
            DTypeOption::Float32 => DType::F32,
        })
    }

    pub fn load_policy(&self) -> LoadPolicy {
        match self.load_policy {
            LoadPolicyOption::PerRequest => LoadPolicy::PerRequest,
            LoadPolicyOption::Shared => LoadPolicy::Shared,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeviceOption {
    Cpu,
    Metal,
    Cuda(usize),
}

#[derive(Debug, Clone, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub(crate) enum DTypeOption {
    Float16,
    BFloat16,
    Float32,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum LoadPolicyOption {
    PerRequest,
    Shared,
}

impl FromStr for DeviceOption {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(DeviceOption::Cpu),
            "metal" => Ok(DeviceOption::Metal),
            s => match s.strip_prefix("cuda:") {
                Some(id) => Ok(DeviceOption::Cuda(id.parse::<usize>()?)),
                None => Err(anyhow!("Invalid device option: {}", s)),
            },
        }
    }
}

fn parse_device(s: &str) -> Result<DeviceOption, anyhow::Error> {
    DeviceOption::from_str(s)
}
