pub mod architecture;
mod builder;
pub mod config;
pub mod error;
pub mod tags;
pub mod weights;

pub use builder::{InputTensor, audio_conv_rnn, build};
pub use config::{Backend, BackendConfig};
pub use error::{Result, TaggerError};
pub use machine_learning::arch::{DataFormat, Input, Model};
pub use weights::Weights;
