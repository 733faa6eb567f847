//! Attribute an inbound wishlist to a participant by sender address.

use crate::core::types::{GameState, ParticipantName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Sender is not on the roster.
    UnknownSender,
    /// Participant already has a wishlist on file; first one wins.
    AlreadyReceived(ParticipantName),
    /// First wishlist from this participant.
    New(ParticipantName),
}

/// Case-insensitive exact match of `address` against participant emails.
pub fn resolve_sender(state: &GameState, address: &str) -> Option<ParticipantName> {
    state
        .participants
        .iter()
        .find(|(_, participant)| participant.email_matches(address))
        .map(|(name, _)| name.clone())
}

pub fn attribute(state: &GameState, address: &str) -> Attribution {
    match resolve_sender(state, address) {
        None => Attribution::UnknownSender,
        Some(name) => {
            let received = state
                .participant(&name)
                .is_some_and(|participant| participant.wishlist_received);
            if received {
                Attribution::AlreadyReceived(name)
            } else {
                Attribution::New(name)
            }
        }
    }
}
