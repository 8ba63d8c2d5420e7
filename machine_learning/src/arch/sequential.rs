use log::debug;
use ndarray::ArrayD;

use super::layers::Layer;
use crate::{
    MlErr, Result,
    io::{self, StateDict, TensorData},
};

/// A sequential network: information flows forward through its named layers, one after the
/// other.
pub struct Sequential {
    layers: Vec<(String, Layer)>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The named layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = (String, Layer)>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `x` - The input data, batch axis first.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, mut x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        for (name, layer) in self.layers.iter_mut() {
            x = layer.forward(x)?;
            debug!("{name} -> {:?}", x.shape());
        }

        Ok(x)
    }

    /// Switches every layer between training and inference behaviour.
    pub fn train(&mut self, training: bool) {
        for (_, layer) in self.layers.iter_mut() {
            layer.set_training(training);
        }
    }

    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the amount of parameters in the network.
    pub fn size(&self) -> usize {
        self.layers.iter().map(|(_, layer)| layer.size()).sum()
    }

    /// Copies every parameter of the network keyed `"{layer}.{param}"`.
    pub fn state_dict(&self) -> StateDict {
        self.layers
            .iter()
            .flat_map(|(name, layer)| {
                layer
                    .params()
                    .into_iter()
                    .map(move |(key, p)| (format!("{name}.{key}"), TensorData::from_array(p)))
            })
            .collect()
    }

    /// Overwrites every parameter of the network with the matching entry of `state`. Entries
    /// that don't belong to the network are ignored.
    ///
    /// # Returns
    /// An error if an entry is missing or has the wrong shape, in which case no parameter is
    /// modified.
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let diff = io::diff_state_dict(&self.state_dict(), state);

        if let Some(key) = diff.missing_keys.into_iter().next() {
            return Err(MlErr::MissingParam(key));
        }

        if let Some((key, expected, got)) = diff.shape_mismatches.into_iter().next() {
            return Err(MlErr::ParamShapeMismatch { key, got, expected });
        }

        if !diff.unexpected_keys.is_empty() {
            debug!("ignoring {} unexpected entries", diff.unexpected_keys.len());
        }

        let mut updates = Vec::new();
        for (name, layer) in self.layers.iter() {
            for (key, _) in layer.params() {
                let key = format!("{name}.{key}");
                let td = state
                    .get(&key)
                    .ok_or_else(|| MlErr::MissingParam(key.clone()))?;
                updates.push(td.to_array()?);
            }
        }

        let targets = self
            .layers
            .iter_mut()
            .flat_map(|(_, layer)| layer.params_mut())
            .map(|(_, p)| p);

        for (p, value) in targets.zip(updates) {
            *p = value;
        }

        Ok(())
    }

    /// Reverses the rows and columns of every convolution kernel.
    pub fn flip_conv_kernels(&mut self) {
        for (name, layer) in self.layers.iter_mut() {
            if let Layer::Conv2d(conv) = layer {
                conv.flip_kernels();
                debug!("flipped the kernels of {name}");
            }
        }
    }
}
