use ndarray::{Array1, ArrayD, Axis, Ix1, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use super::param_view;
use crate::{MlErr, Result};

/// Default fuzz factor added to the variance.
pub const EPSILON: f32 = 1e-3;

/// Which statistics normalize the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMode {
    /// Running mean/variance at inference, batch statistics while training.
    #[default]
    RunningStats,
    /// Per-batch statistics both while training and at inference.
    BatchStats,
}

/// Normalizes the input along a single axis:
///
/// `y = gamma * (x - mean) / sqrt(var + eps) + beta`
///
/// where every statistic and parameter is indexed by the position along `axis`.
#[derive(Clone, Debug)]
pub struct BatchNorm {
    axis: usize,
    mode: NormMode,
    eps: f32,
    training: bool,

    gamma: ArrayD<f32>,
    beta: ArrayD<f32>,
    running_mean: ArrayD<f32>,
    // Holds the running variance, the name matches the stored weights.
    running_std: ArrayD<f32>,
}

impl BatchNorm {
    /// Creates a new `BatchNorm` with identity parameters.
    ///
    /// # Arguments
    /// * `axis` - The normalized axis, counted with the batch axis at 0.
    /// * `dim` - The length of that axis.
    /// * `mode` - Which statistics to normalize with.
    ///
    /// # Returns
    /// A new `BatchNorm` or an error if `axis` is the batch axis.
    pub fn new(axis: usize, dim: usize, mode: NormMode) -> Result<Self> {
        if axis == 0 {
            return Err(MlErr::InvalidSpec(
                "batch normalization can't be applied along the batch axis".into(),
            ));
        }

        Ok(Self {
            axis,
            mode,
            eps: EPSILON,
            training: false,
            gamma: ArrayD::ones(IxDyn(&[dim])),
            beta: ArrayD::zeros(IxDyn(&[dim])),
            running_mean: ArrayD::zeros(IxDyn(&[dim])),
            running_std: ArrayD::ones(IxDyn(&[dim])),
        })
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn params(&self) -> Vec<(&'static str, &ArrayD<f32>)> {
        vec![
            ("gamma", &self.gamma),
            ("beta", &self.beta),
            ("running_mean", &self.running_mean),
            ("running_std", &self.running_std),
        ]
    }

    pub fn params_mut(&mut self) -> Vec<(&'static str, &mut ArrayD<f32>)> {
        vec![
            ("gamma", &mut self.gamma),
            ("beta", &mut self.beta),
            ("running_mean", &mut self.running_mean),
            ("running_std", &mut self.running_std),
        ]
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let dim = self.gamma.len();

        if self.axis >= x.ndim() {
            return Err(MlErr::InvalidShape {
                what: "batch normalization input",
                shape: x.shape().to_vec(),
            });
        }

        if x.len_of(Axis(self.axis)) != dim {
            return Err(MlErr::SizeMismatch {
                what: "batch normalization axis",
                got: x.len_of(Axis(self.axis)),
                expected: dim,
            });
        }

        let (mean, var) = match (self.mode, self.training) {
            (NormMode::RunningStats, false) => (
                param_view::<Ix1>(&self.running_mean, "running_mean")?.to_owned(),
                param_view::<Ix1>(&self.running_std, "running_std")?.to_owned(),
            ),
            _ => batch_stats(&x, self.axis),
        };

        let gamma = param_view::<Ix1>(&self.gamma, "gamma")?;
        let beta = param_view::<Ix1>(&self.beta, "beta")?;
        let eps = self.eps;

        let scale = Zip::from(&gamma)
            .and(&var)
            .map_collect(|&g, &v| g / (v + eps).sqrt());
        let shift = Zip::from(&beta)
            .and(&mean)
            .and(&scale)
            .map_collect(|&b, &m, &s| b - m * s);

        let mut bshape = vec![1; x.ndim()];
        bshape[self.axis] = dim;
        let scale = scale.into_shape_with_order(IxDyn(&bshape))?;
        let shift = shift.into_shape_with_order(IxDyn(&bshape))?;

        Ok(x * &scale + &shift)
    }
}

/// Mean and (biased) variance of every slice along `axis`.
fn batch_stats(x: &ArrayD<f32>, axis: usize) -> (Array1<f32>, Array1<f32>) {
    let dim = x.len_of(Axis(axis));
    let mut mean = Array1::zeros(dim);
    let mut var = Array1::zeros(dim);

    for (i, slice) in x.axis_iter(Axis(axis)).enumerate() {
        let m = slice.mean().unwrap_or(0.);
        mean[i] = m;
        var[i] = slice.mapv(|v| (v - m).powi(2)).mean().unwrap_or(0.);
    }

    (mean, var)
}
