//! Seam to the selection authority.
//!
//! The authority owns the selection state machine. The overlay pulls
//! snapshots from it and pushes user intents at it; the authority in turn
//! pushes [`Notification`]s back.

mod memory;
mod protocol;
mod ws;

pub use memory::MemoryAuthority;
pub use protocol::{ClientMessage, ServerMessage, StatePayload};
pub use ws::WsAuthority;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::input::{ButtonEdge, OverlayKey, PointerButton};
use crate::state::{ScreenSize, SelectionState};

/// Authority errors.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Connection to authority closed")]
    Closed,
    #[error("Authority did not answer in time")]
    Timeout,
    #[error("Authority rejected request: {0}")]
    Rejected(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid authority URL: {0}")]
    InvalidUrl(String),
}

impl From<serde_json::Error> for AuthorityError {
    fn from(err: serde_json::Error) -> Self {
        AuthorityError::Protocol(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AuthorityError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AuthorityError::Transport(err.to_string())
    }
}

/// Result type for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Boxed future for authority calls.
///
/// Not `Send`: the engine drives every call from a single task.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// User intent forwarded to the authority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// The overlay surface is ready to be shown.
    Ready,
    /// Latest pointer position for this frame.
    PointerMove { x: f64, y: f64 },
    /// Pointer button edge (only the left button is ever sent).
    Button { button: PointerButton, edge: ButtonEdge },
    /// Confirm or cancel.
    Key(OverlayKey),
    /// Current viewport size.
    WindowSize(ScreenSize),
    /// The clean frame is up; take the screenshot now.
    RequestCapture,
}

/// Push notification from the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Selection state changed; pull it again.
    StateChanged,
    /// Start the clean-frame handshake for a screenshot.
    BeginCapture,
    /// The screenshot attempt is over; ordinary rendering may resume.
    CaptureFinished,
    /// The overlay should go away.
    Dismiss,
}

/// Connection to the selection authority.
///
/// `send` is fire-and-forget: it enqueues the intent and returns without
/// waiting for the authority. Intents are delivered in the order they were
/// sent.
pub trait Authority {
    /// Pull the current selection snapshot.
    fn get_selection_state(&self) -> BoxFuture<'_, AuthorityResult<SelectionState>>;

    /// Enqueue an intent for the authority.
    fn send(&self, intent: Intent) -> AuthorityResult<()>;

    /// Report the viewport size.
    fn report_window_size(&self, size: ScreenSize) -> AuthorityResult<()> {
        self.send(Intent::WindowSize(size))
    }

    /// Report the latest pointer position.
    fn report_pointer_move(&self, x: f64, y: f64) -> AuthorityResult<()> {
        self.send(Intent::PointerMove { x, y })
    }

    /// Report a pointer button edge.
    fn report_button(&self, button: PointerButton, edge: ButtonEdge) -> AuthorityResult<()> {
        self.send(Intent::Button { button, edge })
    }

    /// Report a confirm/cancel key.
    fn report_key(&self, key: OverlayKey) -> AuthorityResult<()> {
        self.send(Intent::Key(key))
    }

    /// Ask the authority to take the screenshot.
    fn request_capture(&self) -> AuthorityResult<()> {
        self.send(Intent::RequestCapture)
    }
}
