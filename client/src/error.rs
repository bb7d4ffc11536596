//! Error types raised by the map surface and the layer utilities

use thiserror::Error;

/// Errors raised while driving the map engine or loading overlay inputs.
///
/// Overlays never let these escape: they are logged, trigger a fallback or
/// leave the overlay uninitialized. Only configuration loading hands them
/// back to the host.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("source `{0}` already exists")]
    DuplicateSource(String),

    #[error("layer `{0}` already exists")]
    DuplicateLayer(String),

    #[error("source `{0}` does not exist")]
    UnknownSource(String),

    #[error("layer `{0}` does not exist")]
    UnknownLayer(String),

    #[error("layer `{layer}` references missing source `{source_id}`")]
    MissingSource { layer: String, source_id: String },

    #[error("source `{source_id}` is still used by layer `{layer}`")]
    SourceInUse { source_id: String, layer: String },

    #[error("layer `{layer}` uses unsupported expression `{operator}`")]
    UnsupportedExpression { layer: String, operator: String },

    #[error("layer `{layer}` of kind {kind} was rejected by the engine")]
    RejectedLayer { layer: String, kind: &'static str },

    #[error("marker {0} does not exist")]
    UnknownMarker(u64),

    #[error("map engine is busy")]
    EngineBusy,

    #[error("map engine is no longer attached")]
    EngineGone,

    #[error("failed to decode payload")]
    Payload(#[from] serde_json::Error),

    #[error("backend reported an unsuccessful response")]
    Unsuccessful,

    #[error("failed to decode icon image")]
    Icon(#[from] image::ImageError),

    #[error("invalid configuration value for {key}: {reason}")]
    Config { key: &'static str, reason: String },
}
