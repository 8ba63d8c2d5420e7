pub mod arch;
pub mod error;
pub mod initialization;
pub mod io;
mod test;

pub use error::{MlErr, Result};
