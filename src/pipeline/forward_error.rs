use crate::{shaper::ShapeError, transport::TransportError};

/// Reasons a single event is dropped by a worker.
///
/// None of these reach the producer. The worker logs the error code, which is
/// the variant name in SCREAMING_SNAKE_CASE, and moves on to the next event.
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardError {
    #[error(transparent)]
    MalformedEmbeddedJson(#[from] ShapeError),

    #[error("failed to serialize payload: {0}")]
    SerializationFailure(#[source] serde_json::Error),

    #[error(transparent)]
    TransportFailure(#[from] TransportError),
}
