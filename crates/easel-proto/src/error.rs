//! Protocol error types.

/// Errors arising from wire encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Message could not be parsed or failed schema validation.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Message could not be encoded for the wire.
    #[error("encode failed: {0}")]
    Encode(String),
}
