use std::{cell::RefCell, collections::HashSet, rc::Rc};

use log::debug;
use ndarray::ArrayD;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    Input, Model, Sequential,
    activations::{ActFn, ActFnSpec},
    layers::{
        Activation, BatchNorm, Conv2d, Dense, Dropout, Gru, Layer, MaxPool2d, Permute, Reshape,
        ZeroPadding2d,
    },
    spec::{LayerSpec, NamedLayerSpec},
};
use crate::{
    MlErr, Result,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// Builds `Model`s given a list of layer specifications.
///
/// Kernels are drawn from a Glorot uniform distribution, biases start at zero and batch
/// normalizations start as identities.
pub struct ModelBuilder {
    rng: Rc<RefCell<StdRng>>,
}

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    ///
    /// # Arguments
    /// * `seed` - Seeds the parameter initialization, drawn from the OS when absent.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Rc::new(RefCell::new(Self::generate_rng(seed))),
        }
    }

    /// Builds a new `Model` following the specs, layer after layer.
    ///
    /// # Arguments
    /// * `name` - The name of the model.
    /// * `input` - The input the first layer is fed from.
    /// * `specs` - The named layers, in order.
    ///
    /// # Returns
    /// The model or an error if a layer doesn't fit the output of the previous one or two
    /// layers share a name.
    pub fn build(&self, name: &str, input: Input, specs: &[NamedLayerSpec]) -> Result<Model> {
        let mut names = HashSet::new();
        let mut layers = Vec::with_capacity(specs.len());
        let mut shapes = Vec::with_capacity(specs.len());
        let mut shape = input.shape().to_vec();

        for NamedLayerSpec { name, spec } in specs {
            if !names.insert(name.as_str()) {
                return Err(MlErr::InvalidSpec(format!("duplicated layer name `{name}`")));
            }

            let layer = self.resolve_layer(spec, &shape)?;
            shape = spec.output_shape(&shape)?;
            debug!(params = layer.size(); "{name} ({}) -> {shape:?}", spec.kind());

            layers.push((name.clone(), layer));
            shapes.push(shape.clone());
        }

        Model::new(name, input, Sequential::new(layers), shapes)
    }

    fn resolve_layer(&self, spec: &LayerSpec, input: &[usize]) -> Result<Layer> {
        let layer = match spec {
            LayerSpec::ZeroPadding2d { padding, format } => {
                Layer::ZeroPadding2d(ZeroPadding2d::new(*padding, *format))
            }
            LayerSpec::BatchNorm { axis, mode } => {
                let dim = spec
                    .param_shapes(input)?
                    .first()
                    .and_then(|(_, s)| s.first().copied())
                    .unwrap_or_default();
                Layer::BatchNorm(BatchNorm::new(*axis, dim, *mode)?)
            }
            LayerSpec::Conv2d {
                filters, format, ..
            } => {
                let shapes = spec.param_shapes(input)?;
                let w_shape = &shapes[0].1;
                let receptive: usize = w_shape[2..].iter().product();
                let w = self.glorot(w_shape, w_shape[1] * receptive, filters * receptive)?;
                let b = Self::zeros(&shapes[1].1)?;
                Layer::Conv2d(Conv2d::new(w, b, *format)?)
            }
            LayerSpec::Activation { act_fn } => {
                Layer::Activation(Activation::new(self.resolve_act_fn(*act_fn)))
            }
            LayerSpec::MaxPool2d {
                pool,
                strides,
                format,
            } => Layer::MaxPool2d(MaxPool2d::new(*pool, *strides, *format)?),
            LayerSpec::Dropout { rate } => {
                let seed = self.rng.borrow_mut().random();
                Layer::Dropout(Dropout::new(*rate, seed)?)
            }
            LayerSpec::Permute { dims } => Layer::Permute(Permute::new(dims.clone())?),
            LayerSpec::Reshape { target } => Layer::Reshape(Reshape::new(target.clone())),
            LayerSpec::Gru {
                return_sequences, ..
            } => {
                let mut params = Vec::with_capacity(9);
                for (key, shape) in spec.param_shapes(input)? {
                    let p = match key.starts_with('b') {
                        true => Self::zeros(&shape)?,
                        false => self.glorot(&shape, shape[0], shape[1])?,
                    };
                    params.push(p);
                }

                let [wz, uz, bz, wr, ur, br, wh, uh, bh] = take::<9>(params)?;
                Layer::Gru(Gru::new([wz, wr, wh], [uz, ur, uh], [bz, br, bh], *return_sequences)?)
            }
            LayerSpec::Dense { act_fn, .. } => {
                let shapes = spec.param_shapes(input)?;
                let w_shape = &shapes[0].1;
                let w = self.glorot(w_shape, w_shape[0], w_shape[1])?;
                let b = Self::zeros(&shapes[1].1)?;
                let act_fn = act_fn.map(|a| self.resolve_act_fn(a));
                Layer::Dense(Dense::new(w, b, act_fn)?)
            }
        };

        Ok(layer)
    }

    fn resolve_act_fn(&self, spec: ActFnSpec) -> ActFn {
        ActFn::from(spec)
    }

    fn glorot(&self, shape: &[usize], fan_in: usize, fan_out: usize) -> Result<ArrayD<f32>> {
        let n = shape.iter().product();
        let mut param_gen = RandParamGen::xavier_uniform(self.rng.clone(), n, fan_in, fan_out)?;
        param_gen.tensor(shape)
    }

    fn zeros(shape: &[usize]) -> Result<ArrayD<f32>> {
        ConstParamGen::for_shape(0., shape).tensor(shape)
    }

    fn generate_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Moves a vector of exactly `N` parameters into an array.
fn take<const N: usize>(params: Vec<ArrayD<f32>>) -> Result<[ArrayD<f32>; N]> {
    params.try_into().map_err(|p: Vec<ArrayD<f32>>| MlErr::SizeMismatch {
        what: "layer parameters",
        got: p.len(),
        expected: N,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;
    use crate::arch::DataFormat;

    fn dense_specs() -> Vec<NamedLayerSpec> {
        vec![
            NamedLayerSpec::new(
                "hidden",
                LayerSpec::Dense {
                    units: 4,
                    act_fn: Some(ActFnSpec::Tanh),
                },
            ),
            NamedLayerSpec::new("drop", LayerSpec::Dropout { rate: 0.5 }),
            NamedLayerSpec::new(
                "out",
                LayerSpec::Dense {
                    units: 2,
                    act_fn: Some(ActFnSpec::Sigmoid),
                },
            ),
        ]
    }

    #[test]
    fn folds_specs_into_a_model() {
        let builder = ModelBuilder::new(Some(7));
        let mut model = builder.build("mlp", Input::new(vec![3]), &dense_specs()).unwrap();

        assert_eq!(model.output_shape(), [2]);
        assert_eq!(model.count_params(), 3 * 4 + 4 + 4 * 2 + 2);
        assert_eq!(model.layers().map(|(n, _)| n).collect::<Vec<_>>(), ["hidden", "drop", "out"]);

        let y = model.predict(ArrayD::ones(IxDyn(&[5, 3]))).unwrap();
        assert_eq!(y.shape(), [5, 2]);
    }

    #[test]
    fn seeded_builders_agree() {
        let a = ModelBuilder::new(Some(1)).build("a", Input::new(vec![3]), &dense_specs()).unwrap();
        let b = ModelBuilder::new(Some(1)).build("b", Input::new(vec![3]), &dense_specs()).unwrap();
        let c = ModelBuilder::new(Some(2)).build("c", Input::new(vec![3]), &dense_specs()).unwrap();

        assert_eq!(a.state_dict(), b.state_dict());
        assert_ne!(a.state_dict(), c.state_dict());
    }

    #[test]
    fn initial_values_follow_the_param_kind() {
        let specs = vec![
            NamedLayerSpec::new(
                "conv",
                LayerSpec::Conv2d {
                    filters: 8,
                    kernel: (3, 3),
                    format: DataFormat::ChannelsFirst,
                },
            ),
            NamedLayerSpec::new(
                "bn",
                LayerSpec::BatchNorm {
                    axis: 1,
                    mode: Default::default(),
                },
            ),
        ];
        let model = ModelBuilder::new(Some(3)).build("m", Input::new(vec![2, 5, 5]), &specs).unwrap();
        let state = model.state_dict();

        let limit = (6f32 / ((2 + 8) * 9) as f32).sqrt();
        assert!(state["conv.W"].data.iter().all(|v| v.abs() <= limit));
        assert!(state["conv.b"].data.iter().all(|&v| v == 0.));
        assert!(state["bn.gamma"].data.iter().all(|&v| v == 1.));
        assert!(state["bn.running_std"].data.iter().all(|&v| v == 1.));
        assert!(state["bn.running_mean"].data.iter().all(|&v| v == 0.));
        assert_eq!(state["bn.beta"].shape, [8]);
    }

    #[test]
    fn rejects_duplicated_names_and_bad_chains() {
        let builder = ModelBuilder::new(Some(0));

        let mut specs = dense_specs();
        specs[2].name = "hidden".into();
        assert!(builder.build("m", Input::new(vec![3]), &specs).is_err());

        // A dense layer can't take an image.
        assert!(builder.build("m", Input::new(vec![1, 2, 3]), &dense_specs()).is_err());
    }
}
