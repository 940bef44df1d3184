//! Error type shared by every layer, the model and the configuration loaders.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, NnError>;

/// Errors produced while building, running or persisting a network.
#[derive(Debug)]
pub enum NnError {
    /// A vector length disagrees with what the layer expects.
    ///
    /// A backward call with nothing cached reports `expected == 0`.
    ShapeMismatch {
        layer: &'static str,
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// Hyperparameters that cannot describe a valid layer or run.
    InvalidConfig(String),
    /// Activation name outside the supported set.
    UnknownActivation(String),
    /// Layer tag without a registered factory.
    UnknownLayerType(String),
    /// Malformed token stream.
    Parse(String),
    /// A layer body failed to decode while loading a model.
    Load {
        index: usize,
        layer: String,
        source: Box<NnError>,
    },
    Io(io::Error),
    Json(serde_json::Error),
}

impl NnError {
    pub(crate) fn shape(layer: &'static str, what: &'static str, got: usize, expected: usize) -> Self {
        NnError::ShapeMismatch {
            layer,
            what,
            got,
            expected,
        }
    }
}

impl Display for NnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnError::ShapeMismatch {
                layer,
                what,
                got,
                expected,
            } => write!(
                f,
                "{layer}: size mismatch for {what}, got {got} and expected {expected}"
            ),
            NnError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            NnError::UnknownActivation(name) => write!(f, "unknown activation function '{name}'"),
            NnError::UnknownLayerType(name) => write!(f, "unknown layer type '{name}'"),
            NnError::Parse(msg) => write!(f, "parse error: {msg}"),
            NnError::Load {
                index,
                layer,
                source,
            } => write!(f, "failed to load layer {index} ({layer}): {source}"),
            NnError::Io(err) => write!(f, "i/o error: {err}"),
            NnError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl Error for NnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NnError::Load { source, .. } => Some(source.as_ref()),
            NnError::Io(err) => Some(err),
            NnError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NnError {
    fn from(err: io::Error) -> Self {
        NnError::Io(err)
    }
}

impl From<serde_json::Error> for NnError {
    fn from(err: serde_json::Error) -> Self {
        NnError::Json(err)
    }
}
