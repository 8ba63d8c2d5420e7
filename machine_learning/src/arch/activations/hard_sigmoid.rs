/// Piecewise linear approximation of the sigmoid: `clamp(0.2 z + 0.5, 0, 1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HardSigmoid;

impl HardSigmoid {
    pub fn new() -> Self {
        Self
    }

    pub fn f(&self, z: f32) -> f32 {
        (0.2 * z + 0.5).clamp(0., 1.)
    }
}
