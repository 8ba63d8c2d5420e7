use ndarray::ArrayD;

use crate::{MlErr, Result};

/// Reshapes the non-batch axes in row-major order.
#[derive(Clone, Debug)]
pub struct Reshape {
    target: Vec<usize>,
}

impl Reshape {
    pub fn new(target: Vec<usize>) -> Self {
        Self { target }
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(&batch) = x.shape().first() else {
            return Err(MlErr::RankMismatch {
                layer: "Reshape",
                got: 0,
                expected: 1,
            });
        };

        let got: usize = x.shape()[1..].iter().product();
        let expected: usize = self.target.iter().product();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what: "reshaped elements",
                got,
                expected,
            });
        }

        let mut shape = Vec::with_capacity(self.target.len() + 1);
        shape.push(batch);
        shape.extend_from_slice(&self.target);

        Ok(x.as_standard_layout()
            .into_owned()
            .into_shape_with_order(shape)?)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, IxDyn};

    use super::*;
    use crate::arch::layers::Permute;

    #[test]
    fn flattens_in_row_major_order() {
        let reshape = Reshape::new(vec![6]);
        let x = Array::from_shape_fn(IxDyn(&[2, 2, 3]), |i| (i[0] * 10 + i[1] * 3 + i[2]) as f32);
        let y = reshape.forward(x).unwrap();

        assert_eq!(y.shape(), [2, 6]);
        assert_eq!(y[[1, 4]], 14.);
    }

    #[test]
    fn honours_a_previous_permutation() {
        let x = Array::from_shape_fn(IxDyn(&[1, 2, 1, 3]), |i| (i[1] * 10 + i[3]) as f32);
        let permuted = Permute::new(vec![3, 1, 2]).unwrap().forward(x).unwrap();
        let y = Reshape::new(vec![3, 2]).forward(permuted).unwrap();

        // Every step carries its two channels.
        assert_eq!(y.shape(), [1, 3, 2]);
        assert_eq!(y[[0, 2, 0]], 2.);
        assert_eq!(y[[0, 2, 1]], 12.);
    }

    #[test]
    fn element_count_must_match() {
        let reshape = Reshape::new(vec![15, 128]);
        assert!(reshape.forward(Array::zeros(IxDyn(&[1, 128, 1, 14]))).is_err());
    }
}
