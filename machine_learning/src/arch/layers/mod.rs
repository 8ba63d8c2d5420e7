mod activation;
mod batch_norm;
mod conv2d;
mod dense;
mod dropout;
mod gru;
mod layer;
mod max_pool;
mod permute;
mod reshape;
mod zero_padding;

pub use activation::Activation;
pub use batch_norm::{BatchNorm, NormMode};
pub use conv2d::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use gru::Gru;
pub use layer::Layer;
pub use max_pool::MaxPool2d;
pub use permute::Permute;
pub use reshape::Reshape;
pub use zero_padding::ZeroPadding2d;

pub(crate) use layer::{expect_rank, param_view};
