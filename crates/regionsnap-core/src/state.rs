//! Authoritative selection state as reported by the authority.
//!
//! The client never mutates these values; it holds a disposable copy obtained
//! on each pull and projects it into a [`RenderModel`](crate::geometry::RenderModel).

use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Discrete mode of the authority's selection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing drawn yet, or the selection was reset.
    #[default]
    Idle,
    /// The user is dragging out a new rectangle.
    Drawing,
    /// A rectangle has been drawn and is waiting for confirmation.
    Confirmed,
    /// The confirmed rectangle is being dragged around.
    Moving,
    /// The screenshot handshake is running; nothing may be visible.
    Capturing,
}

impl Phase {
    /// Get display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Drawing => "Drawing",
            Phase::Confirmed => "Confirmed",
            Phase::Moving => "Moving",
            Phase::Capturing => "Capturing",
        }
    }
}

/// Axis-aligned rectangle in overlay-surface pixels.
///
/// Stored as origin plus extent to match what the authority reports.
/// A region whose width or height is not positive is *empty*.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Region {
    /// The zero-sized region at the origin.
    pub const ZERO: Region = Region { x: 0.0, y: 0.0, w: 0.0, h: 0.0 };

    /// Create a new region.
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Copy of this region with negative extents clamped to zero.
    pub fn clamped(self) -> Self {
        Self {
            w: self.w.max(0.0),
            h: self.h.max(0.0),
            ..self
        }
    }

    /// Whether this region covers no area.
    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    /// Right edge (`x + w`).
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    /// Bottom edge (`y + h`).
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Convert to a kurbo rectangle (`x0,y0,x1,y1`).
    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.right(), self.bottom())
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        let rect = rect.abs();
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }
}

/// Visible dimensions of the overlay surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub w: f64,
    pub h: f64,
}

impl ScreenSize {
    /// Create a new screen size.
    pub const fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// The whole screen as a region anchored at the origin.
    pub fn full_region(self) -> Region {
        Region::new(0.0, 0.0, self.w, self.h)
    }
}

/// Snapshot of the authority's selection state.
///
/// `bounds` is absent only while nothing has been drawn; every phase other
/// than [`Phase::Idle`] is expected to carry bounds, but consumers must not
/// rely on that.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionState {
    pub phase: Phase,
    #[serde(default)]
    pub bounds: Option<Region>,
    pub screen: ScreenSize,
}

impl SelectionState {
    /// Create a new snapshot.
    pub fn new(phase: Phase, bounds: Option<Region>, screen: ScreenSize) -> Self {
        Self { phase, bounds, screen }
    }

    /// Idle snapshot with nothing drawn.
    pub fn idle(screen: ScreenSize) -> Self {
        Self::new(Phase::Idle, None, screen)
    }

    /// Whether the snapshot honors the bounds invariant for its phase.
    pub fn is_consistent(&self) -> bool {
        self.bounds.is_some() || self.phase == Phase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_clamps_negative_extent() {
        let r = Region::new(10.0, 20.0, -5.0, 30.0).clamped();
        assert_eq!(r, Region::new(10.0, 20.0, 0.0, 30.0));
        assert!(r.is_empty());
    }

    #[test]
    fn test_region_from_inverted_rect() {
        let r = Region::from(Rect::new(50.0, 40.0, 10.0, 20.0));
        assert_eq!(r, Region::new(10.0, 20.0, 40.0, 20.0));
    }

    #[test]
    fn test_phase_serializes_as_name() {
        let json = serde_json::to_string(&Phase::Capturing).unwrap();
        assert_eq!(json, "\"Capturing\"");
        let phase: Phase = serde_json::from_str("\"Moving\"").unwrap();
        assert_eq!(phase, Phase::Moving);
        assert_eq!(phase.name(), "Moving");
    }

    #[test]
    fn test_state_deserialize_null_bounds() {
        let json = r#"{"phase":"Idle","bounds":null,"screen":{"w":800,"h":600}}"#;
        let state: SelectionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.bounds, None);
        assert_eq!(state.screen, ScreenSize::new(800.0, 600.0));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_state_consistency() {
        let screen = ScreenSize::new(100.0, 100.0);
        assert!(!SelectionState::new(Phase::Drawing, None, screen).is_consistent());
        assert!(
            SelectionState::new(Phase::Drawing, Some(Region::new(0.0, 0.0, 1.0, 1.0)), screen)
                .is_consistent()
        );
    }
}
