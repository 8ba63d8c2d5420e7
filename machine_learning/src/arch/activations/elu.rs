/// Exponential linear unit: `z` when positive, `alpha (e^z - 1)` otherwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Elu {
    alpha: f32,
}

impl Elu {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.alpha * z.exp_m1() }
    }
}

impl Default for Elu {
    fn default() -> Self {
        Self::new(1.)
    }
}
