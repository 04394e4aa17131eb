use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while importing, encoding or decoding a Tiled map.
///
/// Every variant is fatal: the pipeline never recovers locally and never hands
/// back a partially built map.
#[derive(Debug, Error)]
pub enum TiledError {
    /// An external tileset referenced by the map could not be read.
    #[error("Failed to read external tileset {path:?}: {source}")]
    MissingReference {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The input uses a Tiled feature this pipeline does not implement.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The binary stream is truncated or structurally invalid.
    #[error("Malformed map stream: {0}")]
    MalformedStream(String),

    /// Well-formed input that breaks a map invariant, such as a gid owned by no tileset.
    #[error("Map invariant violated: {0}")]
    InvariantViolation(String),

    /// The XML document could not be parsed.
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<quick_xml::Error> for TiledError {
    fn from(err: quick_xml::Error) -> Self {
        TiledError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for TiledError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        TiledError::Xml(format!("Failed to parse attribute: {err}"))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TiledError>;
