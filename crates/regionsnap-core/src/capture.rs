//! Clean-frame handshake before a screenshot.
//!
//! ```text
//!            BeginCapture            clean frame presented,
//!                                    settle delay elapsed
//!   Normal ─────────────> Preparing ─────────────────────> Locked
//!     ^                     ^   │ (lock set, clean pull)      │
//!     │                     └───┘ BeginCapture                │
//!     └──────────────────────── CaptureFinished ──────────────┘
//! ```
//!
//! Inside `Preparing` the sequencer waits for the clean-frame pull to
//! settle, then for the surface to present it, then for the settle delay.
//! While not `Normal` the capture lock is held and ordinary state-changed
//! notifications are ignored.

use std::time::Duration;

use tokio::time::Instant;

use crate::authority::Intent;
use crate::sync::RefreshTicket;

/// Default delay between the clean render and the capture request.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(5);

/// Where the handshake currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePhase {
    /// Ordinary state-driven rendering.
    #[default]
    Normal,
    /// Lock held, waiting for the clean render and the settle delay.
    Preparing,
    /// Capture requested; waiting for the authority to report it finished.
    Locked,
}

/// Drives the clean-frame handshake and owns the capture lock.
#[derive(Debug)]
pub struct CaptureSequencer {
    phase: CapturePhase,
    settle_delay: Duration,
    /// Pull whose render the settle delay waits for.
    pending: Option<RefreshTicket>,
    /// The clean-frame pull settled; waiting for the surface to present it.
    presenting: bool,
    /// When the capture request is due.
    deadline: Option<Instant>,
}

impl Default for CaptureSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl CaptureSequencer {
    /// Create a sequencer with the given settle delay.
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            phase: CapturePhase::Normal,
            settle_delay,
            pending: None,
            presenting: false,
            deadline: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    /// Whether ordinary refreshes must be suppressed.
    pub fn is_locked(&self) -> bool {
        self.phase != CapturePhase::Normal
    }

    /// Start (or restart) the handshake; `ticket` is the clean-frame pull.
    pub fn begin(&mut self, ticket: RefreshTicket) {
        if self.phase == CapturePhase::Preparing {
            log::debug!("Capture restarted before settling");
        }
        self.phase = CapturePhase::Preparing;
        self.pending = Some(ticket);
        self.presenting = false;
        self.deadline = None;
    }

    /// The pull `ticket` finished (rendered, discarded or failed).
    ///
    /// Returns whether this was the clean-frame pull, in which case the
    /// caller waits for the surface and reports back with
    /// [`presented`](Self::presented).
    pub fn pull_settled(&mut self, ticket: RefreshTicket) -> bool {
        if self.phase != CapturePhase::Preparing || self.pending != Some(ticket) {
            return false;
        }
        self.pending = None;
        self.presenting = true;
        true
    }

    /// The clean frame is on screen. Arms the settle timer.
    ///
    /// Returns whether the timer was armed.
    pub fn presented(&mut self, now: Instant) -> bool {
        if self.phase != CapturePhase::Preparing || !self.presenting {
            return false;
        }
        self.presenting = false;
        self.deadline = Some(now + self.settle_delay);
        true
    }

    /// When the capture request is due, if the timer is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire the capture request once the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<Intent> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.phase = CapturePhase::Locked;
                Some(Intent::RequestCapture)
            }
            _ => None,
        }
    }

    /// Drop the lock and return to ordinary rendering.
    ///
    /// Returns whether the lock was held.
    pub fn release(&mut self) -> bool {
        let was_locked = self.is_locked();
        self.phase = CapturePhase::Normal;
        self.pending = None;
        self.presenting = false;
        self.deadline = None;
        was_locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use crate::sync::StateSync;

    fn tickets(n: usize) -> Vec<RefreshTicket> {
        let mut sync = StateSync::new(RecordingSurface::new());
        (0..n).map(|_| sync.begin_refresh()).collect()
    }

    #[test]
    fn test_full_handshake() {
        let t = tickets(1)[0];
        let now = Instant::now();
        let mut capture = CaptureSequencer::new(Duration::from_millis(5));

        assert!(!capture.is_locked());
        capture.begin(t);
        assert_eq!(capture.phase(), CapturePhase::Preparing);
        assert!(capture.is_locked());
        assert_eq!(capture.deadline(), None);

        assert!(capture.pull_settled(t));
        assert_eq!(capture.deadline(), None);
        assert!(capture.presented(now));
        assert_eq!(capture.deadline(), Some(now + Duration::from_millis(5)));
        assert!(!capture.presented(now));

        assert_eq!(capture.fire(now), None);
        assert_eq!(
            capture.fire(now + Duration::from_millis(5)),
            Some(Intent::RequestCapture)
        );
        assert_eq!(capture.phase(), CapturePhase::Locked);
        assert!(capture.is_locked());
        assert_eq!(capture.fire(now + Duration::from_secs(1)), None);

        assert!(capture.release());
        assert_eq!(capture.phase(), CapturePhase::Normal);
        assert!(!capture.release());
    }

    #[test]
    fn test_unrelated_pull_does_not_arm_timer() {
        let t = tickets(2);
        let mut capture = CaptureSequencer::default();

        capture.begin(t[1]);
        assert!(!capture.pull_settled(t[0]));
        assert!(!capture.presented(Instant::now()));
        assert_eq!(capture.deadline(), None);
    }

    #[test]
    fn test_presentation_outside_handshake_is_ignored() {
        let t = tickets(1)[0];
        let mut capture = CaptureSequencer::default();

        assert!(!capture.presented(Instant::now()));
        capture.begin(t);
        assert!(!capture.presented(Instant::now()));
        assert_eq!(capture.deadline(), None);
    }

    #[test]
    fn test_restart_from_locked() {
        let t = tickets(2);
        let now = Instant::now();
        let mut capture = CaptureSequencer::new(Duration::ZERO);

        capture.begin(t[0]);
        capture.pull_settled(t[0]);
        capture.presented(now);
        capture.fire(now);
        assert_eq!(capture.phase(), CapturePhase::Locked);

        capture.begin(t[1]);
        assert_eq!(capture.phase(), CapturePhase::Preparing);
        assert!(!capture.pull_settled(t[0]));
        assert!(capture.pull_settled(t[1]));
    }

    #[test]
    fn test_restart_while_preparing_disarms_timer() {
        let t = tickets(2);
        let now = Instant::now();
        let mut capture = CaptureSequencer::default();

        capture.begin(t[0]);
        capture.pull_settled(t[0]);
        capture.presented(now);
        assert!(capture.deadline().is_some());

        capture.begin(t[1]);
        assert_eq!(capture.deadline(), None);
        assert!(!capture.presented(now));
        assert_eq!(capture.fire(now + Duration::from_secs(1)), None);
    }
}
