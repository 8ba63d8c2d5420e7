use ndarray::{Array2, Array3, ArrayD, ArrayView2, Axis, Ix1, Ix2, Ix3, Zip};

use super::{expect_rank, param_view};
use crate::{MlErr, Result, arch::activations::ActFn};

/// Gate order of every parameter triple.
const GATES: [&str; 3] = ["z", "r", "h"];

/// A gated recurrent unit over `(batch, timesteps, features)` inputs, starting from a zero
/// state. For each step `t`:
///
/// ```text
/// z  = inner(x_t W_z + b_z + h U_z)
/// r  = inner(x_t W_r + b_r + h U_r)
/// hh = act(x_t W_h + b_h + (r * h) U_h)
/// h  = z * h + (1 - z) * hh
/// ```
///
/// Parameters are exposed as `W_z, U_z, b_z, W_r, U_r, b_r, W_h, U_h, b_h`.
#[derive(Clone, Debug)]
pub struct Gru {
    return_sequences: bool,
    act_fn: ActFn,
    inner_act_fn: ActFn,

    kernels: [ArrayD<f32>; 3],
    recurrent: [ArrayD<f32>; 3],
    biases: [ArrayD<f32>; 3],
}

impl Gru {
    /// Creates a new `Gru` with a `tanh` candidate and `hard_sigmoid` gates.
    ///
    /// # Arguments
    /// * `kernels` - The input kernels `W_z, W_r, W_h`, each shaped `(features, units)`.
    /// * `recurrent` - The recurrent kernels `U_z, U_r, U_h`, each shaped `(units, units)`.
    /// * `biases` - The biases `b_z, b_r, b_h`, each of length `units`.
    /// * `return_sequences` - Whether to output every step or only the last one.
    ///
    /// # Returns
    /// A new `Gru` or an error if the parameter shapes disagree.
    pub fn new(
        kernels: [ArrayD<f32>; 3],
        recurrent: [ArrayD<f32>; 3],
        biases: [ArrayD<f32>; 3],
        return_sequences: bool,
    ) -> Result<Self> {
        let units = biases[0].len();
        let features = param_view::<Ix2>(&kernels[0], "GRU kernel")?.nrows();

        for i in 0..3 {
            let w = param_view::<Ix2>(&kernels[i], "GRU kernel")?;
            let u = param_view::<Ix2>(&recurrent[i], "GRU recurrent kernel")?;
            let b = param_view::<Ix1>(&biases[i], "GRU bias")?;

            if w.dim() != (features, units) || u.dim() != (units, units) || b.len() != units {
                return Err(MlErr::InvalidSpec(format!(
                    "GRU gate {} parameters have shapes {:?}, {:?} and {:?} for {units} units",
                    GATES[i],
                    w.shape(),
                    u.shape(),
                    b.shape()
                )));
            }
        }

        Ok(Self {
            return_sequences,
            act_fn: ActFn::tanh(),
            inner_act_fn: ActFn::hard_sigmoid(),
            kernels,
            recurrent,
            biases,
        })
    }

    pub fn units(&self) -> usize {
        self.biases[0].len()
    }

    pub fn params(&self) -> Vec<(&'static str, &ArrayD<f32>)> {
        let [wz, wr, wh] = &self.kernels;
        let [uz, ur, uh] = &self.recurrent;
        let [bz, br, bh] = &self.biases;

        vec![
            ("W_z", wz),
            ("U_z", uz),
            ("b_z", bz),
            ("W_r", wr),
            ("U_r", ur),
            ("b_r", br),
            ("W_h", wh),
            ("U_h", uh),
            ("b_h", bh),
        ]
    }

    pub fn params_mut(&mut self) -> Vec<(&'static str, &mut ArrayD<f32>)> {
        let [wz, wr, wh] = &mut self.kernels;
        let [uz, ur, uh] = &mut self.recurrent;
        let [bz, br, bh] = &mut self.biases;

        vec![
            ("W_z", wz),
            ("U_z", uz),
            ("b_z", bz),
            ("W_r", wr),
            ("U_r", ur),
            ("b_r", br),
            ("W_h", wh),
            ("U_h", uh),
            ("b_h", bh),
        ]
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = expect_rank::<Ix3>(x, "GRU")?;
        let (n, steps, features) = x.dim();
        let units = self.units();

        let expected = param_view::<Ix2>(&self.kernels[0], "GRU kernel")?.nrows();
        if features != expected {
            return Err(MlErr::SizeMismatch {
                what: "GRU input features",
                got: features,
                expected,
            });
        }

        // Input projections of every step at once, one per gate.
        let flat = x.to_shape((n * steps, features))?;
        let mut projections = Vec::with_capacity(3);
        for (w, b) in self.kernels.iter().zip(&self.biases) {
            let w = param_view::<Ix2>(w, "GRU kernel")?;
            let b = param_view::<Ix1>(b, "GRU bias")?;
            let p = (flat.dot(&w) + &b).into_shape_with_order((n, steps, units))?;
            projections.push(p);
        }

        let u: Vec<ArrayView2<f32>> = self
            .recurrent
            .iter()
            .map(|u| param_view::<Ix2>(u, "GRU recurrent kernel"))
            .collect::<Result<_>>()?;

        let mut h = Array2::zeros((n, units));
        let mut seq = self.return_sequences.then(|| Array3::zeros((n, steps, units)));

        for t in 0..steps {
            let step = |gate: usize| projections[gate].index_axis(Axis(1), t);
            h = self.step(&h, [step(0), step(1), step(2)], &u);

            if let Some(seq) = seq.as_mut() {
                seq.index_axis_mut(Axis(1), t).assign(&h);
            }
        }

        Ok(match seq {
            Some(seq) => seq.into_dyn(),
            None => h.into_dyn(),
        })
    }

    /// Advances the state `h` by one step given the gate projections of the step input.
    fn step(&self, h: &Array2<f32>, x: [ArrayView2<f32>; 3], u: &[ArrayView2<f32>]) -> Array2<f32> {
        let [xz, xr, xh] = x;
        let (inner, act) = (self.inner_act_fn, self.act_fn);

        let z = (&xz + &h.dot(&u[0])).mapv_into(|v| inner.f(v));
        let r = (&xr + &h.dot(&u[1])).mapv_into(|v| inner.f(v));
        let hh = (&xh + &(&r * h).dot(&u[2])).mapv_into(|v| act.f(v));

        Zip::from(&z)
            .and(h)
            .and(&hh)
            .map_collect(|&z, &prev, &cand| z * prev + (1. - z) * cand)
    }
}
