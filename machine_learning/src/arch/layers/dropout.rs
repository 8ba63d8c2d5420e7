use ndarray::{ArrayD, Zip};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::{SeedableRng, rngs::StdRng};

use crate::{MlErr, Result};

/// Inverted dropout: while training each element is zeroed with probability `rate` and the
/// survivors are scaled by `1 / (1 - rate)`. At inference it's the identity.
#[derive(Clone, Debug)]
pub struct Dropout {
    rate: f32,
    training: bool,
    rng: StdRng,
}

impl Dropout {
    /// Creates a new `Dropout`.
    ///
    /// # Arguments
    /// * `rate` - The probability of dropping an element, in `[0, 1)`.
    /// * `seed` - Seed for the masks drawn while training.
    ///
    /// # Returns
    /// A new `Dropout` or an error if the rate is out of range.
    pub fn new(rate: f32, seed: u64) -> Result<Self> {
        if !(0. ..1.).contains(&rate) {
            return Err(MlErr::InvalidSpec(format!(
                "dropout rate must be in [0, 1), got {rate}"
            )));
        }

        Ok(Self {
            rate,
            training: false,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward(&mut self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if !self.training || self.rate == 0. {
            return Ok(x);
        }

        let keep = 1. - self.rate;
        let unit = Uniform::new(0f32, 1.)
            .map_err(|e| MlErr::InvalidSpec(format!("dropout mask distribution: {e}")))?;
        let mask = ArrayD::random_using(x.raw_dim(), unit, &mut self.rng);

        Ok(Zip::from(&x)
            .and(&mask)
            .map_collect(|&v, &u| if u < keep { v / keep } else { 0. }))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;

    #[test]
    fn identity_at_inference() {
        let mut dropout = Dropout::new(0.5, 0).unwrap();
        let x = ArrayD::from_elem(IxDyn(&[4, 8]), 3.);

        assert_eq!(dropout.forward(x.clone()).unwrap(), x);
    }

    #[test]
    fn training_drops_and_rescales() {
        let mut dropout = Dropout::new(0.5, 7).unwrap();
        dropout.set_training(true);

        let x = ArrayD::ones(IxDyn(&[64, 64]));
        let y = dropout.forward(x).unwrap();

        assert!(y.iter().all(|&v| v == 0. || v == 2.));
        let kept = y.iter().filter(|&&v| v == 2.).count() as f32 / y.len() as f32;
        assert!((0.4..0.6).contains(&kept));
    }

    #[test]
    fn rate_out_of_range() {
        assert!(Dropout::new(1., 0).is_err());
        assert!(Dropout::new(-0.1, 0).is_err());
    }
}
