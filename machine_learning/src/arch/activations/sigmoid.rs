/// The logistic function `1 / (1 + e^-z)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sigmoid;

impl Sigmoid {
    pub fn new() -> Self {
        Self
    }

    pub fn f(&self, z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered_and_saturates() {
        let s = Sigmoid::new();
        assert_eq!(s.f(0.), 0.5);
        assert!(s.f(20.) > 0.999);
        assert!(s.f(-20.) < 0.001);
    }
}
