//! Authoritative-state cache and refresh protocol.
//!
//! Every pull gets a monotonic [`RefreshTicket`]. A response is rendered only
//! if it is newer than the last rendered one and not below the discard
//! floor, so a slow pull can never paint over a fresher frame.

use crate::authority::{Authority, AuthorityResult, BoxFuture};
use crate::geometry::{RenderModel, project};
use crate::state::{ScreenSize, SelectionState};
use crate::surface::OverlaySurface;

/// Sequence number of one state pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    /// Raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// What happened to a completed pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was projected and shown.
    Applied,
    /// A newer frame was already shown, or the pull predates the floor.
    Stale,
    /// The pull failed; the previous frame stays up.
    Failed,
}

/// Keeps the overlay surface in step with the authority.
pub struct StateSync<S: OverlaySurface> {
    surface: S,
    issued: u64,
    last_applied: u64,
    floor: u64,
    last_state: Option<SelectionState>,
    last_model: Option<RenderModel>,
}

impl<S: OverlaySurface> StateSync<S> {
    /// Create a sync client drawing onto `surface`.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            issued: 0,
            last_applied: 0,
            floor: 0,
            last_state: None,
            last_model: None,
        }
    }

    /// Show the "nothing known yet" frame: the whole viewport dimmed.
    pub fn show_initial_frame(&mut self, viewport: ScreenSize) {
        self.show(RenderModel::dim_all(viewport));
    }

    /// Issue a ticket for a pull that is about to start.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Discard every response to pulls issued before `ticket`.
    pub fn discard_before(&mut self, ticket: RefreshTicket) {
        self.floor = self.floor.max(ticket.0);
    }

    /// Handle the response to a pull.
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: AuthorityResult<SelectionState>,
    ) -> RefreshOutcome {
        let state = match result {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Selection state pull #{} failed: {}", ticket.0, e);
                return RefreshOutcome::Failed;
            }
        };

        if ticket.0 < self.floor || ticket.0 <= self.last_applied {
            log::debug!(
                "Discarding stale selection state #{} (last applied #{}, floor #{})",
                ticket.0,
                self.last_applied,
                self.floor
            );
            return RefreshOutcome::Stale;
        }

        if !state.is_consistent() {
            log::debug!("{} snapshot without bounds, dimming everything", state.phase.name());
        }

        self.last_applied = ticket.0;
        self.last_state = Some(state);
        self.show(project(&state));
        RefreshOutcome::Applied
    }

    /// Pull the current state and render it.
    pub async fn refresh<A: Authority>(&mut self, authority: &A) -> RefreshOutcome {
        let ticket = self.begin_refresh();
        let result = authority.get_selection_state().await;
        self.complete_refresh(ticket, result)
    }

    /// Last snapshot that was rendered.
    pub fn last_state(&self) -> Option<&SelectionState> {
        self.last_state.as_ref()
    }

    /// Last model handed to the surface.
    pub fn last_model(&self) -> Option<&RenderModel> {
        self.last_model.as_ref()
    }

    /// Resolves once the last model handed to the surface is on screen.
    pub fn presented(&mut self) -> BoxFuture<'static, ()> {
        self.surface.presented()
    }

    fn show(&mut self, model: RenderModel) {
        self.surface.apply(&model);
        self.last_model = Some(model);
    }
}
