//! Cancellable deferred transitions
//!
//! Self-eviction and matchmaking both wait a fixed grace period before opening the
//! next room. Each owner keeps its own slot holding at most one pending transition;
//! scheduling into a slot replaces what that slot held, and a `TimerFired` whose
//! token is not the pending one is ignored. The grace period is best effort only:
//! nothing waits for the previous handle to finish leaving.

use core::time::Duration;

use crate::channel::Effect;
use crate::protocol::MatchOffer;
use crate::session::Outcome;
use crate::types::{RoomId, TimerId};

/// Transition to perform once its timer fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Host a fresh room after being kicked or closed out
    RecreateAfterEviction { room_id: RoomId },
    /// Leave the lobby and move into the paired private room
    CompletePairing { offer: MatchOffer, as_host: bool },
}

#[derive(Debug)]
struct PendingTransition {
    timer: TimerId,
    action: DeferredAction,
}

/// Holds one pending transition behind its timer token.
///
/// Tokens are handed in by the owner so that several slots never share one.
#[derive(Debug, Default)]
pub struct DeferredSlot {
    pending: Option<PendingTransition>,
}

impl DeferredSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` under `timer`, superseding whatever this slot held
    pub fn schedule(
        &mut self,
        timer: TimerId,
        action: DeferredAction,
        delay: Duration,
        out: &mut Outcome,
    ) {
        self.cancel(out);
        self.pending = Some(PendingTransition { timer, action });
        out.effect(Effect::ScheduleTimer { timer, delay });
    }

    /// Cancel the pending transition, if any
    pub fn cancel(&mut self, out: &mut Outcome) -> Option<DeferredAction> {
        let pending = self.pending.take()?;
        out.effect(Effect::CancelTimer {
            timer: pending.timer,
        });
        Some(pending.action)
    }

    /// Take the pending action if `timer` is its token
    pub fn fire(&mut self, timer: TimerId) -> Option<DeferredAction> {
        match &self.pending {
            Some(pending) if pending.timer == timer => self.pending.take().map(|p| p.action),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&DeferredAction> {
        self.pending.as_ref().map(|p| &p.action)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
