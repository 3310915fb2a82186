//! In-process authority for tests and headless use.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use super::{Authority, AuthorityError, AuthorityResult, BoxFuture, Intent};
use crate::state::SelectionState;

#[derive(Debug, Default)]
struct Inner {
    state: SelectionState,
    intents: Vec<Intent>,
    pull_delays: VecDeque<Duration>,
    failing_pulls: usize,
    pulls: usize,
    closed: bool,
}

/// Authority whose state is set directly by the caller.
///
/// Clones share the same state, so a test can keep one handle while the
/// engine owns another. Pull responses are snapshotted when the pull is
/// issued; a delayed pull therefore answers with whatever was current at
/// that moment, like a slow round trip would.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthority {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryAuthority {
    /// Create an authority that reports `state`.
    pub fn new(state: SelectionState) -> Self {
        let authority = Self::default();
        authority.set_state(state);
        authority
    }

    /// Replace the reported state.
    pub fn set_state(&self, state: SelectionState) {
        self.inner.borrow_mut().state = state;
    }

    /// Currently reported state.
    pub fn state(&self) -> SelectionState {
        self.inner.borrow().state
    }

    /// Delay the next not-yet-issued pull by `delay`. Delays queue up in order.
    pub fn delay_next_pull(&self, delay: Duration) {
        self.inner.borrow_mut().pull_delays.push_back(delay);
    }

    /// Make the next `count` pulls fail with a transport error.
    pub fn fail_next_pulls(&self, count: usize) {
        self.inner.borrow_mut().failing_pulls += count;
    }

    /// Reject every further `send` with [`AuthorityError::Closed`].
    pub fn close(&self) {
        self.inner.borrow_mut().closed = true;
    }

    /// Number of pulls issued so far.
    pub fn pull_count(&self) -> usize {
        self.inner.borrow().pulls
    }

    /// All intents received so far, in order.
    pub fn intents(&self) -> Vec<Intent> {
        self.inner.borrow().intents.clone()
    }

    /// Drain the received intents.
    pub fn take_intents(&self) -> Vec<Intent> {
        std::mem::take(&mut self.inner.borrow_mut().intents)
    }
}

impl Authority for MemoryAuthority {
    fn get_selection_state(&self) -> BoxFuture<'_, AuthorityResult<SelectionState>> {
        let (snapshot, delay, fail) = {
            let mut inner = self.inner.borrow_mut();
            inner.pulls += 1;
            let delay = inner.pull_delays.pop_front().unwrap_or_default();
            let fail = inner.failing_pulls > 0;
            if fail {
                inner.failing_pulls -= 1;
            }
            (inner.state, delay, fail)
        };

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(AuthorityError::Transport("injected pull failure".to_string()));
            }
            Ok(snapshot)
        })
    }

    fn send(&self, intent: Intent) -> AuthorityResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return Err(AuthorityError::Closed);
        }
        inner.intents.push(intent);
        Ok(())
    }
}
