use std::path::PathBuf;

use anyhow::Context;
use audio_conv_rnn::{BackendConfig, InputTensor, Weights, architecture, build, tags};
use clap::Parser;
use log::info;
use machine_learning::io;
use ndarray::Ix2;

#[derive(Debug, Parser)]
#[command(about = "Tags mel-spectrograms with the AudioConvRNN music tagger")]
struct Args {
    /// `msd` for the weights pretrained on the Million Song Dataset, `none` for random ones.
    #[arg(short, long, default_value = "none")]
    weights: String,
    /// A safetensors file holding a `melgram` tensor of shape (batch, ...input shape).
    #[arg(short, long)]
    melgram: Option<PathBuf>,
    /// How many tags to print per melgram.
    #[arg(short, long, default_value_t = 5)]
    top: usize,
    /// Print the layer specs as JSON and exit.
    #[arg(long)]
    spec: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = BackendConfig::load()?;

    if args.spec {
        let specs = architecture::layers(config.image_data_format);
        println!("{}", serde_json::to_string_pretty(&specs)?);
        return Ok(());
    }

    let weights = match args.weights.as_str() {
        "none" => None,
        other => Some(other.parse::<Weights>()?),
    };

    let input = args
        .melgram
        .as_ref()
        .map(|path| -> anyhow::Result<InputTensor> {
            let mut state = io::load_safetensors(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let melgram = state
                .remove("melgram")
                .with_context(|| format!("{} has no `melgram` tensor", path.display()))?;
            Ok(InputTensor::Raw(melgram.to_array()?))
        })
        .transpose()?;

    let mut model = build(weights, input, &config)?;
    println!("{model}");

    if model.input().is_bound() {
        let preds = model.predict_bound()?.into_dimensionality::<Ix2>()?;
        info!("tagged {} melgram(s)", preds.nrows());

        for (i, row) in tags::decode_predictions(preds.view(), args.top)?
            .into_iter()
            .enumerate()
        {
            let line: Vec<String> = row.iter().map(|(tag, p)| format!("{tag} ({p:.3})")).collect();
            println!("#{i}: {}", line.join(", "));
        }
    }

    Ok(())
}
