use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata attached to a log line. Values are arbitrary JSON, never assumed to be strings.
pub type Fields = Map<String, Value>;

/// A log record handed to the pipeline by a producer.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Event {
    #[serde(default)]
    pub fields: Fields,
    pub message: String,
}

impl Event {
    pub fn new(fields: Fields, message: impl Into<String>) -> Self {
        Self {
            fields,
            message: message.into(),
        }
    }
}
