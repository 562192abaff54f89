mod reserved;

use serde_json::{Map, Value};

use crate::event::Fields;

pub use reserved::{RESERVED_PREFIX, ReservedFields};

/// Flat document sent to the ingestion endpoint.
pub type Payload = Map<String, Value>;

/// Key that always carries the original message.
pub const LOG_KEY: &str = "log";

/// Error type for payload shaping.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("message is not a JSON object: {0}")]
    MalformedEmbeddedJson(#[source] serde_json::Error),
}

/// Builds the flat payload for one event.
///
/// Field names in `reserved` get the `cf_` prefix. When `merge_json` is set the
/// message must be a JSON object and its top-level keys are merged in as-is.
/// `log` is written last, so it always holds the original message.
///
/// A renamed reserved field wins over a field already named with the prefix:
/// `event_type` and `cf_event_type` together leave only the `event_type` value
/// under `cf_event_type`.
pub fn shape(
    fields: &Fields,
    message: &str,
    reserved: &ReservedFields,
    merge_json: bool,
) -> Result<Payload, ShapeError> {
    let mut payload = Payload::with_capacity(fields.len() + 1);
    let (renamed, plain): (Vec<_>, Vec<_>) =
        fields.iter().partition(|(name, _)| reserved.contains(name));
    for (name, value) in plain.into_iter().chain(renamed) {
        payload.insert(reserved.rename(name).into_owned(), value.clone());
    }

    if merge_json {
        // Deserializing into a Map rejects arrays and scalars too.
        let embedded: Map<String, Value> =
            serde_json::from_str(message).map_err(ShapeError::MalformedEmbeddedJson)?;
        payload.extend(embedded);
    }

    payload.insert(LOG_KEY.to_string(), Value::String(message.to_string()));
    Ok(payload)
}
