#[cfg(feature = "accelerate")]
extern crate accelerate_src;

#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

use anyhow::Result;
use candle_sentiment_examples::{get_device_from_args, EXAMPLE_INPUTS};
use candle_sentiment_pipelines::{
    analyze_sentiment, build_model_loader, LoadPolicy, PretrainedModelLoader,
    DEFAULT_SENTIMENT_MODEL,
};

fn main() -> Result<()> {
    let device = get_device_from_args()?;
    println!("Device: {:?}", device);

    let loader = PretrainedModelLoader::new(DEFAULT_SENTIMENT_MODEL, device, None, None);
    let loader = build_model_loader(loader, LoadPolicy::Shared);

    for text in EXAMPLE_INPUTS {
        println!("{}\n", analyze_sentiment(loader.as_ref(), text));
    }

    Ok(())
}
