//! Read-only status projection. Never looks at `assignments`.

use std::collections::BTreeMap;

use crate::core::types::{Participant, ParticipantName};

/// Who has and hasn't sent a wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub received: Vec<ParticipantName>,
    pub pending: Vec<ParticipantName>,
}

impl StatusReport {
    pub fn total(&self) -> usize {
        self.received.len() + self.pending.len()
    }

    pub fn all_received(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Takes only the participant map so assignments cannot leak into the report.
pub fn status_report(participants: &BTreeMap<ParticipantName, Participant>) -> StatusReport {
    let (received, pending): (Vec<_>, Vec<_>) = participants
        .iter()
        .partition(|(_, participant)| participant.wishlist_received);
    StatusReport {
        received: received.into_iter().map(|(name, _)| name.clone()).collect(),
        pending: pending.into_iter().map(|(name, _)| name.clone()).collect(),
    }
}
