//! JSON wire messages exchanged with the authority.
//!
//! ```json
//! { "type": "cursor", "x": 120.0, "y": 48.0 }
//! { "type": "get_state", "request_id": 7 }
//! { "type": "state", "request_id": 7,
//!   "state": { "phase": "Drawing", "bounds": { "x": 0, "y": 0, "w": 10, "h": 10 } } }
//! { "type": "begin_capture" }
//! ```

use serde::{Deserialize, Serialize};

use super::{Intent, Notification};
use crate::input::{ButtonEdge, OverlayKey, PointerButton};
use crate::state::{Phase, Region, ScreenSize, SelectionState};

/// Messages sent to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Overlay surface is ready to be shown
    Ready,
    /// Coalesced pointer position
    Cursor { x: f64, y: f64 },
    /// Pointer button edge
    Button { button: PointerButton, edge: ButtonEdge },
    /// Confirm/cancel key
    Key { key: OverlayKey },
    /// Viewport size
    WindowSize { width: f64, height: f64 },
    /// Take the screenshot now
    RequestCapture,
    /// Pull the current selection state
    GetState { request_id: u64 },
}

impl From<Intent> for ClientMessage {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Ready => ClientMessage::Ready,
            Intent::PointerMove { x, y } => ClientMessage::Cursor { x, y },
            Intent::Button { button, edge } => ClientMessage::Button { button, edge },
            Intent::Key(key) => ClientMessage::Key { key },
            Intent::WindowSize(size) => ClientMessage::WindowSize {
                width: size.w,
                height: size.h,
            },
            Intent::RequestCapture => ClientMessage::RequestCapture,
        }
    }
}

/// Messages received from the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Answer to `get_state`
    State { request_id: u64, state: StatePayload },
    /// `get_state` could not be answered
    RequestFailed { request_id: u64, message: String },
    /// Selection state changed
    StateChanged,
    /// Start the clean-frame handshake
    BeginCapture,
    /// Screenshot attempt finished
    CaptureFinished,
    /// Close the overlay
    Dismiss,
    /// Error not tied to a request
    Error { message: String },
}

impl ServerMessage {
    /// The push notification carried by this message, if any.
    pub fn notification(&self) -> Option<Notification> {
        match self {
            ServerMessage::StateChanged => Some(Notification::StateChanged),
            ServerMessage::BeginCapture => Some(Notification::BeginCapture),
            ServerMessage::CaptureFinished => Some(Notification::CaptureFinished),
            ServerMessage::Dismiss => Some(Notification::Dismiss),
            _ => None,
        }
    }
}

/// Selection state as it appears on the wire.
///
/// Authorities may leave out `screen`; the client then uses the last
/// viewport size it reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub phase: Phase,
    #[serde(default)]
    pub bounds: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenSize>,
}

impl StatePayload {
    /// Resolve into a snapshot, filling a missing screen from `viewport`.
    pub fn into_state(self, viewport: ScreenSize) -> SelectionState {
        SelectionState {
            phase: self.phase,
            bounds: self.bounds,
            screen: self.screen.unwrap_or(viewport),
        }
    }
}

impl From<SelectionState> for StatePayload {
    fn from(state: SelectionState) -> Self {
        Self {
            phase: state.phase,
            bounds: state.bounds,
            screen: Some(state.screen),
        }
    }
}
