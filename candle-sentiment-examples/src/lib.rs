use anyhow::{anyhow, Result};
use candle_core::Device;
use clap::Parser;

/// Inputs shown as examples in the sentiment analysis form.
pub const EXAMPLE_INPUTS: [&str; 2] = [
    "I love this product! It's amazing.",
    "This is the worst experience I've ever had.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOption {
    Cpu,
    Metal,
    Cuda(usize),
}

fn parse_device_option(s: &str) -> Result<DeviceOption> {
    match s {
        "cpu" => Ok(DeviceOption::Cpu),
        "metal" => Ok(DeviceOption::Metal),
        s => match s.strip_prefix("cuda:") {
            Some(id) => Ok(DeviceOption::Cuda(id.parse::<usize>()?)),
            None => Err(anyhow!("Invalid device option: {}", s)),
        },
    }
}

/// Arguments shared by the examples.
#[derive(Debug, Parser)]
pub struct ExampleArgs {
    /// The device to run the pipeline on: `cpu`, `metal` or `cuda:<id>`.
    #[arg(long, value_parser = parse_device_option, default_value = "cpu")]
    pub device: DeviceOption,
}

pub fn get_device(device: &DeviceOption) -> Result<Device> {
    let device = match device {
        DeviceOption::Cuda(device_id) if cfg!(feature = "cuda") => Device::new_cuda(*device_id)?,
        DeviceOption::Metal if cfg!(feature = "metal") => Device::new_metal(0)?,
        _ => Device::Cpu,
    };

    Ok(device)
}

pub fn get_device_from_args() -> Result<Device> {
    get_device(&ExampleArgs::parse().device)
}
