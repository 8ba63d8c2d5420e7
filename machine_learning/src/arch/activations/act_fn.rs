use serde::{Deserialize, Serialize};

use super::{Elu, HardSigmoid, Sigmoid};

/// Element-wise activation functions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    HardSigmoid(HardSigmoid),
    Elu(Elu),
    Tanh,
}

impl ActFn {
    pub fn sigmoid() -> Self {
        ActFn::Sigmoid(Sigmoid::new())
    }

    pub fn hard_sigmoid() -> Self {
        ActFn::HardSigmoid(HardSigmoid::new())
    }

    pub fn elu(alpha: f32) -> Self {
        ActFn::Elu(Elu::new(alpha))
    }

    pub fn tanh() -> Self {
        ActFn::Tanh
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.f(x),
            ActFn::HardSigmoid(a) => a.f(x),
            ActFn::Elu(a) => a.f(x),
            ActFn::Tanh => x.tanh(),
        }
    }
}

/// Serializable description of an `ActFn`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid,
    HardSigmoid,
    Elu { alpha: f32 },
    Tanh,
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Sigmoid => ActFn::sigmoid(),
            ActFnSpec::HardSigmoid => ActFn::hard_sigmoid(),
            ActFnSpec::Elu { alpha } => ActFn::elu(alpha),
            ActFnSpec::Tanh => ActFn::tanh(),
        }
    }
}
