use ndarray::{ArrayD, IxDyn};

use crate::{MlErr, Result};

/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// An option whether the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Samples a whole tensor of the given shape.
    ///
    /// # Arguments
    /// * `shape` - The shape of the tensor.
    ///
    /// # Returns
    /// The tensor or an error if the generator ran out of values before filling it.
    fn tensor(&mut self, shape: &[usize]) -> Result<ArrayD<f32>> {
        let n = shape.iter().product();
        let values = self.sample(n).unwrap_or_default();

        if values.len() != n {
            return Err(MlErr::SizeMismatch {
                what: "sampled parameters",
                got: values.len(),
                expected: n,
            });
        }

        Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
    }
}
