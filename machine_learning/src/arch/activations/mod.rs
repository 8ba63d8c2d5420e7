mod act_fn;
mod elu;
mod hard_sigmoid;
mod sigmoid;

pub use act_fn::{ActFn, ActFnSpec};
pub use elu::Elu;
pub use hard_sigmoid::HardSigmoid;
pub use sigmoid::Sigmoid;
