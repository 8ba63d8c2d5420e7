use ndarray::{Array4, ArrayD, Ix4, Zip, s};

use super::expect_rank;
use crate::{MlErr, Result, arch::DataFormat};

/// Max pooling over the spatial axes with `valid` padding: windows that don't fit entirely in
/// the input are dropped.
#[derive(Clone, Debug)]
pub struct MaxPool2d {
    pool: (usize, usize),
    strides: (usize, usize),
    format: DataFormat,
}

impl MaxPool2d {
    /// Creates a new `MaxPool2d`.
    ///
    /// # Arguments
    /// * `pool` - The window size over rows and cols.
    /// * `strides` - How much the window moves over rows and cols.
    /// * `format` - How the input axes are ordered.
    ///
    /// # Returns
    /// A new `MaxPool2d` or an error if any size is zero.
    pub fn new(pool: (usize, usize), strides: (usize, usize), format: DataFormat) -> Result<Self> {
        if pool.0 == 0 || pool.1 == 0 || strides.0 == 0 || strides.1 == 0 {
            return Err(MlErr::InvalidSpec(format!(
                "max pooling needs non zero windows and strides, got {pool:?} and {strides:?}"
            )));
        }

        Ok(Self {
            pool,
            strides,
            format,
        })
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let input = self
            .format
            .to_channels_first(expect_rank::<Ix4>(x, "MaxPooling2D")?);
        let (n, c, h, w) = input.dim();
        let (ph, pw) = self.pool;
        let (sh, sw) = self.strides;

        if h < ph || w < pw {
            return Err(MlErr::InvalidShape {
                what: "max pooling input smaller than the window",
                shape: input.shape().to_vec(),
            });
        }

        let (oh, ow) = ((h - ph) / sh + 1, (w - pw) / sw + 1);
        let mut out = Array4::zeros((n, c, oh, ow));

        Zip::indexed(&mut out).par_for_each(|(b, ch, y, x), v| {
            let window = input.slice(s![b, ch, y * sh..y * sh + ph, x * sw..x * sw + pw]);
            *v = window.fold(f32::NEG_INFINITY, |m, &e| m.max(e));
        });

        Ok(self.format.from_channels_first(out).into_dyn())
    }
}
