//! Error types for network construction and use.

use thiserror::Error;

/// Errors surfaced by network construction, loss computation, prediction and
/// (de)serialization.
///
/// Configuration errors are raised at build time and are non-recoverable;
/// target errors are raised by the loss layers during the backward pass.
#[derive(Debug, Error)]
pub enum NetError {
    /// A network definition needs at least an input layer and a loss layer.
    #[error("network definition needs at least an input layer and a loss layer")]
    TooFewLayers,

    /// The first layer definition must be of type `input`.
    #[error("first layer must be 'input', found '{0}'")]
    FirstLayerNotInput(String),

    /// The last layer definition must be a loss layer.
    #[error("last layer must be 'softmax', 'svm' or 'regression', found '{0}'")]
    LastLayerNotLoss(String),

    /// A layer definition carries an unrecognized `type` tag.
    #[error("unknown layer type '{0}'")]
    UnknownLayerType(String),

    /// A layer definition names an activation that is not supported.
    #[error("unsupported activation '{0}' (expected relu, sigmoid, tanh or maxout)")]
    UnsupportedActivation(String),

    /// A layer definition is missing a field its type requires.
    #[error("layer {index} ('{layer_type}'): missing required field '{field}'")]
    MissingField {
        index: usize,
        layer_type: String,
        field: &'static str,
    },

    /// A layer definition carries a field value outside its valid range.
    #[error("layer {index} ('{layer_type}'): {message}")]
    InvalidField {
        index: usize,
        layer_type: String,
        message: String,
    },

    /// The supplied loss target does not match what the loss layer accepts.
    #[error("{layer} loss expects {expected}")]
    TargetMismatch {
        layer: &'static str,
        expected: &'static str,
    },

    /// A class-index target lies outside the score vector.
    #[error("class index {class} out of range for {classes} classes")]
    ClassOutOfRange { class: usize, classes: usize },

    /// `Net::prediction` only works with a softmax output layer.
    #[error("prediction requires a softmax output layer, found '{0}'")]
    PredictionNeedsSoftmax(String),

    /// A trainer configuration value is outside its valid range.
    #[error("invalid trainer configuration: {0}")]
    InvalidTrainerConfig(String),

    /// Reading or writing a network snapshot failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A network snapshot could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
