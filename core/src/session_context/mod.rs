//! Controller session slots.
//!
//! Every connection the transport accepts occupies one slot. The slot index is
//! the session number used for notify flags and echo suppression.

use crate::constants::MAX_CONNECTIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionContext {
    #[default]
    Free,
    Active {
        /// Clock reading when the connection opened.
        opened_at: u64,
        /// Requests served on this connection.
        requests: u32,
    },
}

impl SessionContext {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionContext::Active { .. })
    }
}

pub struct Sessions {
    slots: heapless::Vec<SessionContext, MAX_CONNECTIONS>,
    /// Slot polled first in the next cycle.
    cursor: usize,
}

impl Sessions {
    /// Provisions `count` slots, clamped to [`MAX_CONNECTIONS`].
    pub fn new(count: usize) -> Self {
        let mut slots = heapless::Vec::new();
        for _ in 0..count.clamp(1, MAX_CONNECTIONS) {
            // capacity checked by the clamp above
            let _ = slots.push(SessionContext::Free);
        }
        Self { slots, cursor: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Option<&SessionContext> {
        self.slots.get(slot)
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.get(slot).is_some_and(SessionContext::is_active)
    }

    /// Marks `slot` as connected. Returns false for a slot that does not exist.
    /// Opening an active slot restarts it.
    pub fn open(&mut self, slot: usize, now: u64) -> bool {
        match self.slots.get_mut(slot) {
            Some(context) => {
                if context.is_active() {
                    log::warn!("session {slot} reopened without closing");
                }
                *context = SessionContext::Active {
                    opened_at: now,
                    requests: 0,
                };
                log::debug!("session {slot} opened");
                true
            }
            None => {
                log::warn!("session {slot} is beyond the {} provisioned slots", self.capacity());
                false
            }
        }
    }

    /// Frees `slot`. Returns true when it was active.
    pub fn close(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(context) if context.is_active() => {
                *context = SessionContext::Free;
                log::debug!("session {slot} closed");
                true
            }
            _ => false,
        }
    }

    pub(crate) fn record_request(&mut self, slot: usize) {
        if let Some(SessionContext::Active { requests, .. }) = self.slots.get_mut(slot) {
            *requests = requests.saturating_add(1);
        }
    }

    /// Active slot numbers in ascending order.
    pub fn active(&self) -> heapless::Vec<usize, MAX_CONNECTIONS> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, context)| context.is_active())
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Every slot once, starting at the cursor, which then moves on by one so
    /// the next cycle starts with the following slot.
    pub fn round_robin(&mut self) -> impl Iterator<Item = usize> {
        let capacity = self.capacity();
        let start = self.cursor % capacity;
        self.cursor = (start + 1) % capacity;
        (0..capacity).map(move |offset| (start + offset) % capacity)
    }
}
