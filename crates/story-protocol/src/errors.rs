/// Errors raised while decoding relay payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A frame's data was not a valid message payload.
    #[error("invalid message payload: {0}")]
    InvalidPayload(String),
    /// The image endpoint reported no usable image.
    #[error("image unavailable: {0}")]
    ImageUnavailable(String),
}
