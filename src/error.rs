use std::{fmt, io};

use machine_learning::MlErr;

/// The result type used across the tagger.
pub type Result<T> = std::result::Result<T, TaggerError>;

/// All errors that can occur while building the tagger.
#[derive(Debug)]
pub enum TaggerError {
    /// Unknown `weights` value, caught before building anything.
    InvalidArgument(String),
    /// Pretrained weights requested under a layout they weren't trained for.
    IncompatibleConfiguration(String),
    /// The weights couldn't be fetched.
    Download {
        url: String,
        source: reqwest::Error,
    },
    /// The backend configuration file or environment holds an invalid value.
    InvalidConfig(String),
    /// The graph couldn't be built from the given input.
    Graph(MlErr),
    /// The weights file couldn't be parsed or doesn't match the graph.
    Weights(MlErr),
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for TaggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::IncompatibleConfiguration(msg) => write!(f, "incompatible configuration: {msg}"),
            Self::Download { url, source } => write!(f, "failed to download {url}: {source}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Graph(e) => write!(f, "graph error: {e}"),
            Self::Weights(e) => write!(f, "weights error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for TaggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Download { source, .. } => Some(source),
            Self::Graph(e) | Self::Weights(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TaggerError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MlErr> for TaggerError {
    fn from(e: MlErr) -> Self {
        Self::Graph(e)
    }
}
