use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use safetensors::SafeTensorError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    RankMismatch {
        layer: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidShape {
        what: &'static str,
        shape: Vec<usize>,
    },
    InvalidSpec(String),
    MissingParam(String),
    ParamShapeMismatch {
        key: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    UnsupportedDtype {
        key: String,
        dtype: String,
    },
    UnboundInput,
    Shape(ShapeError),
    SafeTensors(SafeTensorError),
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::RankMismatch {
                layer,
                got,
                expected,
            } => write!(
                f,
                "The {layer} layer expects a rank {expected} input (batch included), got rank {got}"
            ),
            MlErr::InvalidShape { what, shape } => write!(f, "Invalid shape {shape:?} for {what}"),
            MlErr::InvalidSpec(msg) => write!(f, "Invalid layer specification: {msg}"),
            MlErr::MissingParam(key) => write!(f, "The weights have no entry for `{key}`"),
            MlErr::ParamShapeMismatch { key, got, expected } => write!(
                f,
                "The weights entry `{key}` has shape {got:?} but the model expects {expected:?}"
            ),
            MlErr::UnsupportedDtype { key, dtype } => write!(
                f,
                "The weights entry `{key}` is stored as {dtype}, only F32 is supported"
            ),
            MlErr::UnboundInput => write!(f, "The model input is symbolic, there's no tensor bound to it"),
            MlErr::Shape(e) => write!(f, "Shape error: {e}"),
            MlErr::SafeTensors(e) => write!(f, "Failed to (de)serialize safetensors: {e}"),
            MlErr::Io(e) => write!(f, "Io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::SafeTensors(e) => Some(e),
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(e: ShapeError) -> Self {
        MlErr::Shape(e)
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(e: SafeTensorError) -> Self {
        MlErr::SafeTensors(e)
    }
}

impl From<io::Error> for MlErr {
    fn from(e: io::Error) -> Self {
        MlErr::Io(e)
    }
}
