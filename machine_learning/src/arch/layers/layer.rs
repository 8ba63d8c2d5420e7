use ndarray::{Array, ArrayD, ArrayView, Dimension};

use super::{
    Activation, BatchNorm, Conv2d, Dense, Dropout, Gru, MaxPool2d, Permute, Reshape, ZeroPadding2d,
};
use crate::{MlErr, Result};

/// Every layer a `Sequential` can be made of. Tensors flow through them with the batch axis
/// first.
pub enum Layer {
    ZeroPadding2d(ZeroPadding2d),
    BatchNorm(BatchNorm),
    Conv2d(Conv2d),
    Activation(Activation),
    MaxPool2d(MaxPool2d),
    Dropout(Dropout),
    Permute(Permute),
    Reshape(Reshape),
    Gru(Gru),
    Dense(Dense),
}
use Layer::*;

impl Layer {
    /// Makes a forward pass through this layer.
    ///
    /// # Arguments
    /// * `x` - The input tensor, batch axis first.
    ///
    /// # Returns
    /// The output tensor or an error if the input doesn't fit the layer.
    pub fn forward(&mut self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            ZeroPadding2d(l) => l.forward(x),
            BatchNorm(l) => l.forward(x),
            Conv2d(l) => l.forward(x),
            Activation(l) => Ok(l.forward(x)),
            MaxPool2d(l) => l.forward(x),
            Dropout(l) => l.forward(x),
            Permute(l) => l.forward(x),
            Reshape(l) => l.forward(x),
            Gru(l) => l.forward(x),
            Dense(l) => l.forward(x),
        }
    }

    /// The named parameter tensors of this layer, in a stable order.
    pub fn params(&self) -> Vec<(&'static str, &ArrayD<f32>)> {
        match self {
            BatchNorm(l) => l.params(),
            Conv2d(l) => l.params(),
            Gru(l) => l.params(),
            Dense(l) => l.params(),
            _ => Vec::new(),
        }
    }

    /// Mutable version of [`Layer::params`], used when loading weights.
    pub fn params_mut(&mut self) -> Vec<(&'static str, &mut ArrayD<f32>)> {
        match self {
            BatchNorm(l) => l.params_mut(),
            Conv2d(l) => l.params_mut(),
            Gru(l) => l.params_mut(),
            Dense(l) => l.params_mut(),
            _ => Vec::new(),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.params().iter().map(|(_, p)| p.len()).sum()
    }

    /// Switches between training and inference behaviour.
    pub fn set_training(&mut self, training: bool) {
        match self {
            BatchNorm(l) => l.set_training(training),
            Dropout(l) => l.set_training(training),
            _ => {}
        }
    }

    /// A human readable name of the operation.
    pub fn kind(&self) -> &'static str {
        match self {
            ZeroPadding2d(_) => "ZeroPadding2D",
            BatchNorm(_) => "BatchNormalization",
            Conv2d(_) => "Convolution2D",
            Activation(_) => "Activation",
            MaxPool2d(_) => "MaxPooling2D",
            Dropout(_) => "Dropout",
            Permute(_) => "Permute",
            Reshape(_) => "Reshape",
            Gru(_) => "GRU",
            Dense(_) => "Dense",
        }
    }
}

/// Converts a dynamic tensor into a fixed rank one, failing with a readable error.
pub(crate) fn expect_rank<D: Dimension>(
    x: ArrayD<f32>,
    layer: &'static str,
) -> Result<Array<f32, D>> {
    let expected = D::NDIM.unwrap_or(x.ndim());
    if x.ndim() != expected {
        return Err(MlErr::RankMismatch {
            layer,
            got: x.ndim(),
            expected,
        });
    }

    Ok(x.into_dimensionality::<D>()?)
}

/// Views a stored parameter with its fixed rank.
pub(crate) fn param_view<'a, D: Dimension>(
    param: &'a ArrayD<f32>,
    what: &'static str,
) -> Result<ArrayView<'a, f32, D>> {
    param
        .view()
        .into_dimensionality::<D>()
        .map_err(|_| MlErr::InvalidShape {
            what,
            shape: param.shape().to_vec(),
        })
}
