use log::{info, warn};
use machine_learning::{
    MlErr,
    arch::{DataFormat, Input, Model, ModelBuilder},
};
use ndarray::ArrayD;

use crate::{
    architecture::{self, MODEL_NAME},
    config::{Backend, BackendConfig},
    error::{Result, TaggerError},
    weights::{self, CACHE_SUBDIR, Weights, WeightsOrigin},
};

/// What the model is fed from.
#[derive(Clone, Debug)]
pub enum InputTensor {
    /// An existing model input, used as is.
    Symbolic(Input),
    /// A concrete `(batch, ...)` tensor, wrapped into a new input bound to it.
    Raw(ArrayD<f32>),
}

impl From<Input> for InputTensor {
    fn from(input: Input) -> Self {
        InputTensor::Symbolic(input)
    }
}

impl From<ArrayD<f32>> for InputTensor {
    fn from(tensor: ArrayD<f32>) -> Self {
        InputTensor::Raw(tensor)
    }
}

/// Builds the tagger with the configuration of this process.
///
/// # Arguments
/// * `weights` - `Some("msd")` for the weights pretrained on the Million Song Dataset, `None`
///   for a random initialization.
/// * `input` - What to feed the model from, a new symbolic input when absent.
///
/// # Returns
/// The model or an error if `weights` is unknown, the configuration is invalid or the
/// weights couldn't be loaded.
pub fn audio_conv_rnn(weights: Option<&str>, input: Option<InputTensor>) -> Result<Model> {
    let weights = weights.map(str::parse::<Weights>).transpose()?;
    let config = BackendConfig::load()?;
    build(weights, input, &config)
}

/// Builds the tagger given a configuration snapshot.
///
/// # Arguments
/// * `weights` - Which parameters to start from, random when absent.
/// * `input` - What to feed the model from, a new symbolic input when absent.
/// * `config` - The backend configuration, read once.
///
/// # Returns
/// The model or an error if the input doesn't fit, the pretrained weights don't support the
/// configured data format or they couldn't be fetched and loaded.
pub fn build(
    weights: Option<Weights>,
    input: Option<InputTensor>,
    config: &BackendConfig,
) -> Result<Model> {
    let format = config.image_data_format;
    let input = resolve_input(input, format)?;

    info!("building {MODEL_NAME} ({format})");
    let builder = ModelBuilder::new(config.seed);
    let mut model = builder.build(MODEL_NAME, input, &architecture::layers(format))?;

    let Some(weights) = weights else {
        return Ok(model);
    };

    if format != DataFormat::ChannelsFirst {
        return Err(TaggerError::IncompatibleConfiguration(format!(
            "the `{weights}` weights need the channels_first (th) data format, the configured one \
             is {format}; set \"image_data_format\": \"channels_first\" in {}",
            config.home().join("config.json").display()
        )));
    }

    let origin = WeightsOrigin::for_backend(config.backend);
    if !config.home().join(CACHE_SUBDIR).join(origin.file_name).exists() {
        warn!(
            "{} isn't cached and {} is HDF5, pre-seed the cache with converted safetensors weights",
            origin.file_name, origin.url
        );
    }
    let path = weights::get_file(origin.file_name, origin.url, CACHE_SUBDIR, config.home())?;
    model.load_weights(&path).map_err(TaggerError::Weights)?;

    // Theano trained with flipping convolutions, the layers correlate.
    if config.backend == Backend::Theano {
        model.flip_conv_kernels();
    }

    Ok(model)
}

fn resolve_input(input: Option<InputTensor>, format: DataFormat) -> Result<Input> {
    let expected = architecture::input_shape(format);

    let input = match input {
        None => return Ok(Input::new(expected)),
        Some(InputTensor::Symbolic(input)) => input,
        Some(InputTensor::Raw(tensor)) => Input::bound(tensor)?,
    };

    if input.shape() != expected.as_slice() {
        warn!("input shape {:?} doesn't match {expected:?}", input.shape());
        return Err(TaggerError::Graph(MlErr::InvalidShape {
            what: "model input",
            shape: input.shape().to_vec(),
        }));
    }

    Ok(input)
}
