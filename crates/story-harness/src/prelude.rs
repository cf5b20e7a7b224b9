//! Common imports for typical harness usage.
pub use crate::{
    AbortHandle, GeneratedImage, Harness, HarnessBuilder, HarnessError, ProviderId, RunBuilder,
    RunStream, Session, SessionConfig, ToolDelta, UpstreamEvent,
};
