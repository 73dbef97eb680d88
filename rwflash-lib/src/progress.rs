//! Progress events emitted by the flash operations.
//!
//! The library only says which phase is running and how far it got. Front
//! ends decide how to draw that by implementing [`ProgressCallback`].

use std::sync::Arc;
use strum::{AsRefStr, Display};

/// Operation an indicator belongs to. Rendered lowercase as a label.
#[derive(Display, AsRefStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Connect,
    Init,
    Erase,
    Write,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressType {
    /// Single blhost call of unknown duration.
    Spinner,
    /// Chunked work with a known byte total, starting at zero.
    Bar { total: u64 },
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub phase: Phase,
    pub progress_type: ProgressType,
    pub message: String,
}

pub trait ProgressCallback: Send + Sync {
    /// Starts a new indicator and returns its id.
    fn start(&self, info: ProgressInfo) -> ProgressId;

    fn update_message(&self, id: ProgressId, message: String);

    /// Advances a bar by `delta` bytes; ignored for spinners.
    fn increment(&self, id: ProgressId, delta: u64);

    fn finish(&self, id: ProgressId, final_message: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

#[derive(Debug, Default)]
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn start(&self, _info: ProgressInfo) -> ProgressId {
        ProgressId(0)
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn increment(&self, _id: ProgressId, _delta: u64) {}

    fn finish(&self, _id: ProgressId, _final_message: String) {}
}

pub type ProgressCallbackArc = Arc<dyn ProgressCallback>;

pub fn no_op_progress_callback() -> ProgressCallbackArc {
    Arc::new(NoOpProgressCallback)
}

/// Opens indicators on the session's callback.
#[derive(Clone)]
pub struct ProgressHelper {
    callback: ProgressCallbackArc,
}

impl ProgressHelper {
    pub fn new(callback: ProgressCallbackArc) -> Self {
        Self { callback }
    }

    pub fn create_spinner(&self, phase: Phase, message: impl Into<String>) -> ProgressHandler {
        self.start(phase, ProgressType::Spinner, message.into())
    }

    pub fn create_bar(&self, phase: Phase, total: u64, message: impl Into<String>) -> ProgressHandler {
        self.start(phase, ProgressType::Bar { total }, message.into())
    }

    fn start(&self, phase: Phase, progress_type: ProgressType, message: String) -> ProgressHandler {
        let id = self.callback.start(ProgressInfo {
            phase,
            progress_type,
            message,
        });
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
        }
    }
}

impl Default for ProgressHelper {
    fn default() -> Self {
        Self::new(no_op_progress_callback())
    }
}

/// A single running indicator. Finishing consumes it.
pub struct ProgressHandler {
    callback: ProgressCallbackArc,
    id: ProgressId,
}

impl ProgressHandler {
    pub fn set_message(&self, message: impl Into<String>) {
        self.callback.update_message(self.id, message.into());
    }

    pub fn inc(&self, delta: u64) {
        self.callback.increment(self.id, delta);
    }

    pub fn finish_with_message(self, message: impl Into<String>) {
        self.callback.finish(self.id, message.into());
    }
}
