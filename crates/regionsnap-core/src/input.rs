//! Input coalescing for the overlay.
//!
//! Pointer motion arrives far more often than the authority needs it, so
//! samples are folded into one position update per display frame. Button,
//! key and resize events are edges and are forwarded as soon as they occur.

use std::time::Duration;

use kurbo::Point;
use serde::{Deserialize, Serialize};
use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::authority::Intent;
use crate::state::ScreenSize;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Other,
}

/// Press or release of a pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonEdge {
    Down,
    Up,
}

/// Keys the overlay reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKey {
    /// Confirm the selection.
    Enter,
    /// Cancel the selection or close the overlay.
    Escape,
}

impl OverlayKey {
    /// Map a host key name to an overlay key, if it is one we handle.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Enter" => Some(OverlayKey::Enter),
            "Escape" => Some(OverlayKey::Escape),
            _ => None,
        }
    }
}

/// Raw input event from the host surface.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer moved to a position in surface coordinates.
    PointerMoved { position: Point },
    /// Pointer button pressed or released.
    Button { button: PointerButton, edge: ButtonEdge },
    /// Key pressed, named the way the host names it (`"Enter"`, `"a"`, ...).
    KeyPressed(String),
    /// Surface was resized.
    Resized(ScreenSize),
}

/// Folds pointer samples into at most one intent per frame.
#[derive(Debug)]
pub struct InputCoalescer {
    /// Latest pointer position seen since the last flush.
    latest: Point,
    /// Whether `latest` has not been sent yet.
    dirty: bool,
    /// Frame clock; created lazily inside the runtime.
    ticker: Option<FrameTicker>,
    frame_interval: Duration,
}

impl InputCoalescer {
    /// Create a coalescer that flushes once per `frame_interval`.
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            latest: Point::ZERO,
            dirty: false,
            ticker: None,
            frame_interval,
        }
    }

    /// Process one raw event.
    ///
    /// Returns the intent to send right away for edge events. Pointer motion
    /// is only recorded and returns `None`.
    pub fn handle(&mut self, event: InputEvent) -> Option<Intent> {
        match event {
            InputEvent::PointerMoved { position } => {
                self.latest = position;
                self.dirty = true;
                None
            }
            InputEvent::Button { button: PointerButton::Left, edge } => Some(Intent::Button {
                button: PointerButton::Left,
                edge,
            }),
            InputEvent::Button { .. } => None,
            InputEvent::KeyPressed(name) => OverlayKey::from_name(&name).map(Intent::Key),
            InputEvent::Resized(size) => Some(Intent::WindowSize(size)),
        }
    }

    /// Take the pending position update, if any.
    pub fn flush(&mut self) -> Option<Intent> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(Intent::PointerMove {
            x: self.latest.x,
            y: self.latest.y,
        })
    }

    /// Whether a position update is waiting for the next frame.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Wait for the next frame and flush.
    ///
    /// Resolves on every frame; yields `None` for frames without motion.
    pub async fn next_frame(&mut self) -> Option<Intent> {
        let period = self.frame_interval;
        self.ticker
            .get_or_insert_with(|| FrameTicker::new(period))
            .tick()
            .await;
        self.flush()
    }
}

/// Repeating frame clock.
///
/// Late frames are skipped rather than bunched up, so a stalled loop never
/// produces a burst of position updates.
#[derive(Debug)]
pub struct FrameTicker {
    interval: Interval,
}

impl FrameTicker {
    /// Create a ticker with the given period. Must be called inside a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    /// Wait for the next frame boundary.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
