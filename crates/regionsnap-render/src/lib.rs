//! RegionSnap Render Library
//!
//! Turns overlay render models into ARGB pixel frames.

mod renderer;

pub use renderer::{
    DASH_ON, DASH_PERIOD, OverlayPalette, PixelRenderer, RenderResult, RendererError, argb,
};
