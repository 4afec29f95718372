//! Event notifications to subscribed sessions.

use super::Report;
use crate::data_model::{CharacteristicId, Database};

/// Where a queued change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Set by the accessory itself.
    Local,
    /// Written by the session in this slot.
    Remote(usize),
}

impl Database {
    /// Drains the change queue and renders one event body for every session
    /// in `sessions` subscribed to at least one changed characteristic.
    ///
    /// A session does not hear about a characteristic when every change to
    /// it in this cycle was its own write.
    pub fn drain_notifications(
        &mut self,
        sessions: &[usize],
    ) -> crate::Result<Vec<(usize, Vec<u8>)>> {
        if self.notifications.is_empty() {
            return Ok(Vec::new());
        }
        let changes = std::mem::take(&mut self.notifications);

        // changed characteristic and the session whose own echo it would be
        let mut changed: Vec<(CharacteristicId, Option<usize>)> = Vec::new();
        for change in changes
            .iter()
            .filter(|c| c.status.is_ok() && c.value.is_some())
        {
            let writer = match change.origin {
                Origin::Remote(session) => Some(session),
                Origin::Local => None,
            };
            match changed.iter_mut().find(|(id, _)| *id == change.id) {
                Some((_, echo)) => {
                    if *echo != writer {
                        *echo = None;
                    }
                }
                None => changed.push((change.id, writer)),
            }
        }

        let mut events = Vec::new();
        for &session in sessions {
            let ids: Vec<CharacteristicId> = changed
                .iter()
                .filter(|(_, echo)| *echo != Some(session))
                .map(|(id, _)| *id)
                .filter(|id| self.find(*id).is_some_and(|c| c.notify_enabled(session)))
                .collect();
            if ids.is_empty() {
                continue;
            }
            let body = self.encode_to_vec(&Report::Event(&ids))?;
            log::trace!(
                "event to session {session}: {}",
                String::from_utf8_lossy(&body)
            );
            events.push((session, body));
        }
        Ok(events)
    }

    /// Drops every subscription of a closed session.
    pub fn clear_notify(&mut self, session: usize) {
        for chr in self.characteristics_mut() {
            chr.set_notify(session, false);
        }
    }
}
