use ndarray::{Array4, ArrayD, Ix4, s};

use super::expect_rank;
use crate::{Result, arch::DataFormat};

/// Pads the two spatial axes of an image batch with zeros on both sides.
#[derive(Clone, Debug)]
pub struct ZeroPadding2d {
    padding: (usize, usize),
    format: DataFormat,
}

impl ZeroPadding2d {
    /// Creates a new `ZeroPadding2d`.
    ///
    /// # Arguments
    /// * `padding` - How many zeros to add at each side of the rows and cols axes.
    /// * `format` - How the input axes are ordered.
    pub fn new(padding: (usize, usize), format: DataFormat) -> Self {
        Self { padding, format }
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self
            .format
            .to_channels_first(expect_rank::<Ix4>(x, "ZeroPadding2D")?);
        let (n, c, h, w) = x.dim();
        let (ph, pw) = self.padding;

        let mut out = Array4::zeros((n, c, h + 2 * ph, w + 2 * pw));
        out.slice_mut(s![.., .., ph..ph + h, pw..pw + w]).assign(&x);

        Ok(self.format.from_channels_first(out).into_dyn())
    }
}
