//! Engine timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for [`OverlayEngine`](crate::engine::OverlayEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pointer coalescing period, one display frame.
    pub frame_interval_ms: u64,
    /// Delay between the clean frame and the capture request.
    pub settle_delay_ms: u64,
    /// How long a state pull may take before it is abandoned.
    pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            settle_delay_ms: 5,
            request_timeout_ms: 2000,
        }
    }
}

impl EngineConfig {
    /// Set the coalescing period.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the capture settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the pull timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
