use ndarray::ArrayD;

use crate::arch::activations::ActFn;

/// Applies an activation function element-wise, the shape is left untouched.
#[derive(Clone, Debug)]
pub struct Activation {
    act_fn: ActFn,
}

impl Activation {
    pub fn new(act_fn: ActFn) -> Self {
        Self { act_fn }
    }

    pub fn forward(&self, x: ArrayD<f32>) -> ArrayD<f32> {
        let act_fn = self.act_fn;
        x.mapv_into(|z| act_fn.f(z))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    #[test]
    fn elu_activation_keeps_shape() {
        let layer = Activation::new(ActFn::elu(1.));
        let x = ArrayD::from_shape_vec(IxDyn(&[1, 2, 2]), vec![-1., 0., 1., 2.]).unwrap();
        let y = layer.forward(x);

        assert_eq!(y.shape(), [1, 2, 2]);
        assert!((y[[0, 0, 0]] - ((-1f32).exp() - 1.)).abs() < 1e-6);
        assert_eq!(y[[0, 1, 1]], 2.);
    }
}
