pub mod activations;
mod builder;
mod data_format;
mod input;
pub mod layers;
mod model;
mod sequential;
pub mod spec;

pub use builder::ModelBuilder;
pub use data_format::{Axes, DataFormat};
pub use input::Input;
pub use model::Model;
pub use sequential::Sequential;
