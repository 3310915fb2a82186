//! RegionSnap Application
//!
//! Native shell for the overlay: a transparent full-screen window, the
//! engine thread talking to the authority, and the software presenter.

mod app;
mod config;
mod error;
mod host;

pub use app::{OverlayApp, run};
pub use config::{AUTHORITY_URL_ENV, AppConfig, CONFIG_ENV, DEFAULT_AUTHORITY_URL};
pub use error::{AppError, AppResult};
pub use host::{EngineHandle, HostEvent, SharedModel, WindowSurface, spawn_engine, translate};
