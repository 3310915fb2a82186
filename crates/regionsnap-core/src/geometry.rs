//! Projection of a selection snapshot into overlay rectangles.
//!
//! The overlay is a selection box surrounded by four shades that dim
//! everything outside it:
//!
//! ```text
//! +---------------------------+
//! |            top            |
//! +------+-----------+--------+
//! | left | selection | right  |
//! +------+-----------+--------+
//! |          bottom           |
//! +---------------------------+
//! ```
//!
//! Top and bottom span the full width; left and right span only the
//! selection's rows.

use crate::state::{Phase, Region, ScreenSize, SelectionState};

/// How the selection border should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualStyle {
    /// No border decoration.
    #[default]
    None,
    /// Thin border while the rectangle is being dragged out.
    Drawing,
    /// Bold border with marching ants for a confirmed or moving rectangle.
    ConfirmedOrMoving,
}

impl VisualStyle {
    /// Style used for a given phase.
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Drawing => VisualStyle::Drawing,
            Phase::Confirmed | Phase::Moving => VisualStyle::ConfirmedOrMoving,
            Phase::Idle | Phase::Capturing => VisualStyle::None,
        }
    }

    /// Whether this style animates between frames.
    pub fn is_animated(self) -> bool {
        self == VisualStyle::ConfirmedOrMoving
    }
}

/// One dimming rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Shade {
    pub rect: Region,
    pub visible: bool,
}

impl Shade {
    /// A shade that is not drawn at all.
    pub const HIDDEN: Shade = Shade { rect: Region::ZERO, visible: false };

    /// Shade covering `rect`, visible only when it has area.
    pub fn covering(rect: Region) -> Self {
        Self { rect, visible: !rect.is_empty() }
    }
}

/// Everything the overlay surface needs to draw one frame.
///
/// Recomputed from scratch for every snapshot; never diffed or persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderModel {
    /// Selection rectangle, `None` when no box is shown.
    pub selection_box: Option<Region>,
    pub shade_top: Shade,
    pub shade_bottom: Shade,
    pub shade_left: Shade,
    pub shade_right: Shade,
    pub style: VisualStyle,
    /// Set for the clean frame shown while a screenshot is taken.
    pub suppress_all: bool,
}

impl RenderModel {
    /// Dim the whole screen with no selection box.
    ///
    /// Used when no snapshot has been obtained or nothing has been drawn.
    pub fn dim_all(screen: ScreenSize) -> Self {
        Self {
            shade_top: Shade::covering(screen.full_region()),
            ..Self::default()
        }
    }

    /// Nothing visible at all.
    pub fn suppressed() -> Self {
        Self {
            suppress_all: true,
            ..Self::default()
        }
    }

    /// All four shades in top, bottom, left, right order.
    pub fn shades(&self) -> [Shade; 4] {
        [self.shade_top, self.shade_bottom, self.shade_left, self.shade_right]
    }

    /// Whether any chrome (box or shade) would be drawn.
    pub fn has_visible_chrome(&self) -> bool {
        !self.suppress_all
            && (self.selection_box.is_some() || self.shades().iter().any(|s| s.visible))
    }
}

/// Project an authoritative snapshot into a render model.
///
/// Total and side-effect free: absent bounds dim everything, the capturing
/// phase hides everything, and degenerate bounds yield degenerate but
/// well-formed rectangles.
pub fn project(state: &SelectionState) -> RenderModel {
    if state.phase == Phase::Capturing {
        return RenderModel::suppressed();
    }

    let Some(bounds) = state.bounds else {
        return RenderModel::dim_all(state.screen);
    };

    let Region { x, y, w, h } = bounds.clamped();
    let ScreenSize { w: screen_w, h: screen_h } = state.screen;

    RenderModel {
        selection_box: Some(Region::new(x, y, w, h)),
        shade_top: Shade::covering(Region::new(0.0, 0.0, screen_w, y)),
        shade_bottom: Shade::covering(Region::new(
            0.0,
            y + h,
            screen_w,
            (screen_h - (y + h)).max(0.0),
        )),
        shade_left: Shade::covering(Region::new(0.0, y, x, h)),
        shade_right: Shade::covering(Region::new(
            x + w,
            y,
            (screen_w - (x + w)).max(0.0),
            h,
        )),
        style: VisualStyle::for_phase(state.phase),
        suppress_all: false,
    }
}
