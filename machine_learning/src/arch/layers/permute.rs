use std::iter;

use ndarray::ArrayD;

use crate::{MlErr, Result};

/// Permutes the non-batch axes of its input. `dims` is 1-indexed: `(2, 1)` swaps the first
/// and second non-batch axes.
#[derive(Clone, Debug)]
pub struct Permute {
    dims: Vec<usize>,
}

impl Permute {
    /// Creates a new `Permute`.
    ///
    /// # Returns
    /// A new `Permute` or an error if `dims` isn't a permutation of `1..=dims.len()`.
    pub fn new(dims: Vec<usize>) -> Result<Self> {
        let mut sorted = dims.clone();
        sorted.sort_unstable();

        if !sorted.iter().copied().eq(1..=dims.len()) {
            return Err(MlErr::InvalidSpec(format!(
                "{dims:?} is not a permutation of the non-batch axes"
            )));
        }

        Ok(Self { dims })
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if x.ndim() != self.dims.len() + 1 {
            return Err(MlErr::RankMismatch {
                layer: "Permute",
                got: x.ndim(),
                expected: self.dims.len() + 1,
            });
        }

        let axes: Vec<usize> = iter::once(0).chain(self.dims.iter().copied()).collect();
        Ok(x.permuted_axes(axes))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, IxDyn};

    use super::*;

    #[test]
    fn moves_last_axis_first() {
        let permute = Permute::new(vec![3, 1, 2]).unwrap();
        let x = Array::from_shape_fn(IxDyn(&[1, 2, 3, 4]), |i| (i[1] * 100 + i[2] * 10 + i[3]) as f32);
        let y = permute.forward(x).unwrap();

        assert_eq!(y.shape(), [1, 4, 2, 3]);
        assert_eq!(y[[0, 3, 1, 2]], 123.);
    }

    #[test]
    fn rejects_invalid_permutations() {
        assert!(Permute::new(vec![1, 1, 2]).is_err());
        assert!(Permute::new(vec![0, 1]).is_err());

        let permute = Permute::new(vec![2, 1]).unwrap();
        assert!(permute.forward(Array::zeros(IxDyn(&[1, 2, 3, 4]))).is_err());
    }
}
