use ndarray::{Array2, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, Axis, Ix1, Ix4, linalg, s};
use rayon::prelude::*;

use super::{expect_rank, param_view};
use crate::{MlErr, Result, arch::DataFormat};

/// A 2D cross-correlation with stride 1 and `same` padding: the output keeps the spatial size
/// of the input.
///
/// Kernels are stored as `(filters, in_channels, rows, cols)` whatever the data format is.
#[derive(Clone, Debug)]
pub struct Conv2d {
    format: DataFormat,
    w: ArrayD<f32>,
    b: ArrayD<f32>,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `w` - The kernels, shaped `(filters, in_channels, rows, cols)`.
    /// * `b` - The biases, one per filter.
    /// * `format` - How the input axes are ordered.
    ///
    /// # Returns
    /// A new `Conv2d` or an error if the parameter shapes disagree or the kernel is empty.
    pub fn new(w: ArrayD<f32>, b: ArrayD<f32>, format: DataFormat) -> Result<Self> {
        let kernel = param_view::<Ix4>(&w, "convolution kernel")?;
        let bias = param_view::<Ix1>(&b, "convolution bias")?;

        let (_, _, kh, kw) = kernel.dim();
        if kh == 0 || kw == 0 {
            return Err(MlErr::InvalidSpec(format!(
                "convolution kernels need at least one row and one column, got {kh}x{kw}"
            )));
        }

        if kernel.len_of(Axis(0)) != bias.len() {
            return Err(MlErr::SizeMismatch {
                what: "convolution biases",
                got: bias.len(),
                expected: kernel.len_of(Axis(0)),
            });
        }

        Ok(Self { format, w, b })
    }

    /// Turns true-convolution kernels into cross-correlation ones, or back, by reversing their
    /// rows and columns.
    pub fn flip_kernels(&mut self) {
        self.w.invert_axis(Axis(2));
        self.w.invert_axis(Axis(3));
        self.w = self.w.as_standard_layout().into_owned();
    }

    pub fn params(&self) -> Vec<(&'static str, &ArrayD<f32>)> {
        vec![("W", &self.w), ("b", &self.b)]
    }

    pub fn params_mut(&mut self) -> Vec<(&'static str, &mut ArrayD<f32>)> {
        vec![("W", &mut self.w), ("b", &mut self.b)]
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = self
            .format
            .to_channels_first(expect_rank::<Ix4>(x, "Convolution2D")?);
        let (n, c, h, w) = x.dim();

        let kernel = param_view::<Ix4>(&self.w, "convolution kernel")?;
        let (filters, in_channels, kh, kw) = kernel.dim();
        if c != in_channels {
            return Err(MlErr::SizeMismatch {
                what: "convolution input channels",
                got: c,
                expected: in_channels,
            });
        }

        let kernel = kernel.to_shape((filters, in_channels * kh * kw))?;
        let bias = param_view::<Ix1>(&self.b, "convolution bias")?;

        let outs: Vec<Array2<f32>> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|sample| correlate(sample, kernel.view(), bias, (kh, kw)))
            .collect();

        let views: Vec<_> = outs.iter().map(|o| o.view()).collect();
        let out = ndarray::stack(Axis(0), &views)?.into_shape_with_order((n, filters, h, w))?;

        Ok(self.format.from_channels_first(out).into_dyn())
    }
}

/// Correlates a single `(channels, rows, cols)` sample using im2col and a matrix product.
///
/// # Returns
/// The `(filters, rows * cols)` response.
fn correlate(
    sample: ArrayView3<f32>,
    kernel: ArrayView2<f32>,
    bias: ArrayView1<f32>,
    (kh, kw): (usize, usize),
) -> Array2<f32> {
    let (c, h, w) = sample.dim();
    let (top, left) = ((kh - 1) / 2, (kw - 1) / 2);

    let mut padded = Array3::zeros((c, h + kh - 1, w + kw - 1));
    padded
        .slice_mut(s![.., top..top + h, left..left + w])
        .assign(&sample);

    let mut cols = Array2::zeros((c * kh * kw, h * w));
    for ci in 0..c {
        for i in 0..kh {
            for j in 0..kw {
                let row = (ci * kh + i) * kw + j;
                let window = padded.slice(s![ci, i..i + h, j..j + w]);
                cols.row_mut(row)
                    .iter_mut()
                    .zip(window.iter())
                    .for_each(|(dst, &src)| *dst = src);
            }
        }
    }

    let mut out = Array2::zeros((kernel.nrows(), h * w));
    linalg::general_mat_mul(1., &kernel, &cols, 0., &mut out);
    out += &bias.insert_axis(Axis(1));
    out
}
