#[cfg(feature = "accelerate")]
extern crate accelerate_src;

#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

use anyhow::Result;
use candle_sentiment_examples::{get_device_from_args, EXAMPLE_INPUTS};
use candle_sentiment_pipelines::{TextClassificationPipeline, DEFAULT_SENTIMENT_MODEL};

fn main() -> Result<()> {
    let device = get_device_from_args()?;
    println!("Device: {:?}", device);

    let pipeline = TextClassificationPipeline::new(DEFAULT_SENTIMENT_MODEL, &device, None, None)?;

    let scores = pipeline.run(EXAMPLE_INPUTS[0], None)?;

    println!("`pipeline.run` results: {:?}", scores);

    let results = pipeline.run_batch(EXAMPLE_INPUTS.to_vec(), Some(1))?;

    println!("`pipeline.run_batch` results: {:?}", results);

    Ok(())
}
