use std::time::Duration;

use snesium_debug::{EngineError, Region};

/// Frame pacing of the runner thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Frames at the region's nominal rate.
    #[default]
    Realtime,
    /// As fast as the host allows.
    Unthrottled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeConfig {
    pub region: Region,
    pub pacing: Pacing,
    /// Overrides the region's nominal frame rate.
    pub fps_override: Option<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            region: Region::Ntsc,
            pacing: Pacing::Realtime,
            fps_override: None,
        }
    }
}

impl RuntimeConfig {
    pub(crate) fn frame_duration(&self) -> Duration {
        let fps = self
            .fps_override
            .unwrap_or_else(|| self.region.frames_per_second());
        Duration::from_secs_f64(1.0 / fps)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime control channel disconnected")]
    ControlChannelDisconnected,
    #[error("runtime did not respond in time for {op}")]
    ControlTimeout { op: &'static str },
    #[error("runtime rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
    #[error("invalid frame rate override: {fps}")]
    InvalidFrameRate { fps: f64 },
    #[error("failed to spawn runtime thread: {error}")]
    SpawnFailed { error: String },
}

impl From<RuntimeError> for EngineError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ControlChannelDisconnected => EngineError::Disconnected,
            RuntimeError::ControlTimeout { op } => EngineError::Timeout { op },
            RuntimeError::Rejected { op, reason } => EngineError::Rejected { op, reason },
            other => EngineError::Rejected {
                op: "runtime",
                reason: other.to_string(),
            },
        }
    }
}

pub(crate) const CONTROL_REPLY_TIMEOUT: Duration = Duration::from_secs(2);
pub(crate) const LOAD_REPLY_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a blocking notification may wait for queue space.
pub(crate) const NOTIFY_TIMEOUT: Duration = Duration::from_millis(250);
/// Ticks run between control-channel polls.
pub(crate) const TICKS_PER_SLICE: u32 = 4096;
