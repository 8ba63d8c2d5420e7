use std::{fmt, path::Path};

use log::info;
use ndarray::ArrayD;

use super::{Input, Sequential, layers::Layer};
use crate::{
    MlErr, Result,
    io::{self, StateDict},
};

/// A named network going from an `Input` to a single output.
pub struct Model {
    name: String,
    input: Input,
    network: Sequential,
    // Non-batch output shape of every layer, in order.
    shapes: Vec<Vec<usize>>,
}

impl Model {
    /// Creates a new `Model`.
    ///
    /// # Arguments
    /// * `name` - The name of the model.
    /// * `input` - Where the network is fed from.
    /// * `network` - The layers.
    /// * `shapes` - The non-batch output shape of every layer.
    ///
    /// # Returns
    /// A new `Model` or an error if there isn't exactly one shape per layer.
    pub fn new(
        name: impl Into<String>,
        input: Input,
        network: Sequential,
        shapes: Vec<Vec<usize>>,
    ) -> Result<Self> {
        if shapes.len() != network.len() {
            return Err(MlErr::SizeMismatch {
                what: "layer output shapes",
                got: shapes.len(),
                expected: network.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            input,
            network,
            shapes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    /// The non-batch input shape.
    pub fn input_shape(&self) -> &[usize] {
        self.input.shape()
    }

    /// The non-batch output shape.
    pub fn output_shape(&self) -> &[usize] {
        self.shapes.last().map_or(self.input.shape(), Vec::as_slice)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.network.layers()
    }

    /// Returns the amount of parameters in the model.
    pub fn count_params(&self) -> usize {
        self.network.size()
    }

    /// Switches between training and inference behaviour.
    pub fn train(&mut self, training: bool) {
        self.network.train(training);
    }

    /// Runs the network over a batch.
    ///
    /// # Arguments
    /// * `x` - A batch whose non-batch shape is the model's input shape.
    ///
    /// # Returns
    /// The `(batch, ...output_shape)` prediction.
    pub fn predict(&mut self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if x.ndim() == 0 || x.shape()[1..] != *self.input.shape() {
            return Err(MlErr::InvalidShape {
                what: "model input",
                shape: x.shape().to_vec(),
            });
        }

        self.network.forward(x)
    }

    /// Runs the network over the tensor bound to the input.
    pub fn predict_bound(&mut self) -> Result<ArrayD<f32>> {
        let x = self.input.tensor().ok_or(MlErr::UnboundInput)?.clone();
        self.predict(x)
    }

    pub fn state_dict(&self) -> StateDict {
        self.network.state_dict()
    }

    /// Overwrites the parameters with the matching entries of `state`, see
    /// [`Sequential::load_state_dict`].
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        self.network.load_state_dict(state)
    }

    /// Turns the convolution kernels from true-convolution to cross-correlation order, as needed
    /// by weights trained with flipping convolutions.
    pub fn flip_conv_kernels(&mut self) {
        self.network.flip_conv_kernels();
    }

    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        io::save_safetensors(&self.state_dict(), path)
    }

    /// Loads the parameters from a safetensors file.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let state = io::load_safetensors(path.as_ref())?;
        self.load_state_dict(&state)?;
        info!(
            "loaded {} parameters into {} from {}",
            self.count_params(),
            self.name,
            path.as_ref().display()
        );
        Ok(())
    }

    /// A table of every layer with its type, output shape and parameter count.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

fn batch_shape(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    format!("(None, {})", dims.join(", "))
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 72;
        let row = |f: &mut fmt::Formatter<'_>, name: &str, shape: &str, params: &str| {
            writeln!(f, "{name:<34}{shape:<26}{params:>12}")
        };

        writeln!(f, "Model: {}", self.name)?;
        writeln!(f, "{}", "_".repeat(WIDTH))?;
        row(f, "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(WIDTH))?;
        row(
            f,
            &format!("input_{} (InputLayer)", self.input.id()),
            &batch_shape(self.input.shape()),
            "0",
        )?;

        for ((name, layer), shape) in self.network.layers().zip(&self.shapes) {
            row(
                f,
                &format!("{name} ({})", layer.kind()),
                &batch_shape(shape),
                &layer.size().to_string(),
            )?;
        }

        writeln!(f, "{}", "=".repeat(WIDTH))?;
        writeln!(f, "Total params: {}", self.count_params())
    }
}
