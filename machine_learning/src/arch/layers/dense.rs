use ndarray::{ArrayD, Ix1, Ix2};

use super::{expect_rank, param_view};
use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer: `y = act_fn(x W + b)`.
#[derive(Clone, Debug)]
pub struct Dense {
    act_fn: Option<ActFn>,
    w: ArrayD<f32>,
    b: ArrayD<f32>,
}

impl Dense {
    /// Creates a new `Dense`.
    ///
    /// # Arguments
    /// * `w` - The weights, shaped `(inputs, units)`.
    /// * `b` - The biases, one per unit.
    /// * `act_fn` - An optional activation applied to the affine output.
    ///
    /// # Returns
    /// A new `Dense` or an error if the parameter shapes disagree.
    pub fn new(w: ArrayD<f32>, b: ArrayD<f32>, act_fn: Option<ActFn>) -> Result<Self> {
        let weights = param_view::<Ix2>(&w, "dense weights")?;
        let biases = param_view::<Ix1>(&b, "dense biases")?;

        if weights.ncols() != biases.len() {
            return Err(MlErr::SizeMismatch {
                what: "dense biases",
                got: biases.len(),
                expected: weights.ncols(),
            });
        }

        Ok(Self { act_fn, w, b })
    }

    pub fn params(&self) -> Vec<(&'static str, &ArrayD<f32>)> {
        vec![("W", &self.w), ("b", &self.b)]
    }

    pub fn params_mut(&mut self) -> Vec<(&'static str, &mut ArrayD<f32>)> {
        vec![("W", &mut self.w), ("b", &mut self.b)]
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = expect_rank::<Ix2>(x, "Dense")?;
        let w = param_view::<Ix2>(&self.w, "dense weights")?;
        let b = param_view::<Ix1>(&self.b, "dense biases")?;

        if x.ncols() != w.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dense inputs",
                got: x.ncols(),
                expected: w.nrows(),
            });
        }

        let mut z = x.dot(&w) + &b;

        if let Some(act_fn) = self.act_fn {
            z.mapv_inplace(|v| act_fn.f(v));
        }

        Ok(z.into_dyn())
    }
}
