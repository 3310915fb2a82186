//! Overlay surface abstraction.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::authority::BoxFuture;
use crate::geometry::RenderModel;

/// Something that can show a [`RenderModel`].
///
/// Implementations can rasterize into a pixel buffer, position DOM-like
/// elements, or just record frames for inspection.
pub trait OverlaySurface {
    /// Replace whatever is shown with `model`.
    fn apply(&mut self, model: &RenderModel);

    /// Resolves once the most recently applied model is on screen.
    ///
    /// Surfaces that hand frames to another thread resolve only after that
    /// thread has presented them. The default is for surfaces that show the
    /// model inside `apply`.
    fn presented(&mut self) -> BoxFuture<'static, ()> {
        Box::pin(std::future::ready(()))
    }
}

/// Surface that records every applied model.
///
/// Clones share the same frame list.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    frames: Rc<RefCell<Vec<RenderModel>>>,
    present_delay: Rc<Cell<Duration>>,
}

impl RecordingSurface {
    /// Create an empty recording surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report frames as presented only `delay` after they are awaited.
    pub fn set_present_delay(&self, delay: Duration) {
        self.present_delay.set(delay);
    }

    /// All frames applied so far.
    pub fn frames(&self) -> Vec<RenderModel> {
        self.frames.borrow().clone()
    }

    /// The most recently applied frame.
    pub fn last(&self) -> Option<RenderModel> {
        self.frames.borrow().last().copied()
    }

    /// Number of frames applied so far.
    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Whether nothing has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }
}

impl OverlaySurface for RecordingSurface {
    fn apply(&mut self, model: &RenderModel) {
        self.frames.borrow_mut().push(*model);
    }

    fn presented(&mut self) -> BoxFuture<'static, ()> {
        let delay = self.present_delay.get();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        })
    }
}
