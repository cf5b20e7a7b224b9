//! Wire format shared by the story relay and its clients.
//!
//! The relay writes one [`OutboundMessage`] per SSE frame (`data: <json>\n\n`).
//! Clients read the raw byte stream back through [`SseDecoder`], which buffers
//! partial frames across arbitrary chunk boundaries.

/// Protocol-level error types.
pub mod errors;
/// Image request/response payloads and the displayable image source.
pub mod image;
/// Relay-to-client stream messages.
pub mod message;
/// SSE frame decoding.
pub mod sse;

pub use errors::ProtocolError;
pub use image::{ImageRequest, ImageResponse, ImageSource, data_url};
pub use message::{MessageKind, OutboundMessage};
pub use sse::{SseDecoder, SseFrame};
