use std::sync::Arc;

use crate::harness::HarnessInner;
use crate::run::RunBuilder;

/// Configuration used to create a `Session`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Upstream assistant that answers on every thread this session opens.
    pub assistant_id: String,
}

impl SessionConfig {
    /// Creates a config for the given assistant id.
    pub fn assistant(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
        }
    }
}

/// Handle for starting runs against one assistant.
///
/// Sessions are lightweight and hold no upstream state; each run opens its
/// own thread.
#[derive(Clone)]
pub struct Session {
    pub(crate) harness: Arc<HarnessInner>,
    pub(crate) config: SessionConfig,
}

impl Session {
    pub(crate) fn new(harness: Arc<HarnessInner>, config: SessionConfig) -> Self {
        Self { harness, config }
    }

    /// Starts building a run.
    pub fn run(&self) -> RunBuilder {
        RunBuilder::new(self.harness.clone(), self.config.assistant_id.clone())
    }
}
