//! Codec error types.

/// Errors produced while decoding inbound frames.
///
/// Outbound encoding is infallible: every request type serializes to JSON.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame parsed but is not a JSON object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// A required envelope field is absent or has the wrong type.
    #[error("frame is missing `{0}`")]
    MissingField(&'static str),

    /// The params or result of a known method do not match its schema.
    #[error("invalid payload for `{method}`: {source}")]
    InvalidPayload {
        /// Wire name of the method whose payload failed to project.
        method: String,
        #[source]
        source: serde_json::Error,
    },
}
