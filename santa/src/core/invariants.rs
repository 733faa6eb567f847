//! Semantic invariants not expressible via JSON Schema.

use std::collections::BTreeSet;

use crate::core::types::{GameState, ParticipantName};

/// Check semantic invariants of a game state:
/// - Assignments cover exactly the participant set, once as giver and once as receiver
/// - No one is their own receiver
/// - `wishlist_content` only present when `wishlist_received`
/// - Participant emails unique (case-insensitive)
pub fn validate_invariants(state: &GameState) -> Vec<String> {
    let mut errors = Vec::new();
    let participants: BTreeSet<_> = state.participants.keys().collect();

    let givers: BTreeSet<_> = state.assignments.keys().collect();
    if givers != participants {
        errors.push(format!(
            "assignment givers {:?} do not match participants {:?}",
            names(&givers),
            names(&participants)
        ));
    }

    let mut receivers = BTreeSet::new();
    for (giver, receiver) in &state.assignments {
        if giver == receiver {
            errors.push(format!("{} is assigned to themselves", giver));
        }
        if !state.participants.contains_key(receiver) {
            errors.push(format!("{}: receiver '{}' is not a participant", giver, receiver));
        }
        if !receivers.insert(receiver) {
            errors.push(format!("'{}' is receiver for more than one giver", receiver));
        }
    }
    if receivers.len() != participants.len() {
        let missing: Vec<_> = participants
            .iter()
            .filter(|name| !receivers.contains(*name))
            .map(|name| name.as_str())
            .collect();
        if !missing.is_empty() {
            errors.push(format!("no giver assigned to {}", missing.join(", ")));
        }
    }

    let mut emails = BTreeSet::new();
    for (name, participant) in &state.participants {
        if !participant.wishlist_received && participant.wishlist_content.is_some() {
            errors.push(format!("{}: wishlist content without wishlist_received", name));
        }
        if !emails.insert(participant.email.trim().to_lowercase()) {
            errors.push(format!("{}: duplicate email {}", name, participant.email));
        }
    }

    errors
}

fn names<'a>(set: &BTreeSet<&'a ParticipantName>) -> Vec<&'a str> {
    set.iter().map(|name| name.as_str()).collect()
}
