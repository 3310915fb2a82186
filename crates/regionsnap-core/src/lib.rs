//! RegionSnap Core Library
//!
//! Client-side engine of the region selection overlay. The selection state
//! machine lives in an external authority; this crate turns its snapshots
//! into dim/box rectangles, forwards coalesced user input to it and runs the
//! clean-frame handshake that precedes a screenshot.

pub mod authority;
pub mod capture;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod input;
pub mod state;
pub mod surface;
pub mod sync;

pub use authority::{
    Authority, AuthorityError, AuthorityResult, Intent, MemoryAuthority, Notification, WsAuthority,
};
pub use capture::{CapturePhase, CaptureSequencer};
pub use config::EngineConfig;
pub use engine::{EngineExit, OverlayEngine};
pub use geometry::{RenderModel, Shade, VisualStyle, project};
pub use input::{ButtonEdge, FrameTicker, InputCoalescer, InputEvent, OverlayKey, PointerButton};
pub use state::{Phase, Region, ScreenSize, SelectionState};
pub use surface::{OverlaySurface, RecordingSurface};
pub use sync::{RefreshOutcome, RefreshTicket, StateSync};
