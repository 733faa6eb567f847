//! Random giver → receiver matching.
//!
//! Rejection sampling: shuffle the receivers, zip them against the givers and
//! throw the whole permutation away if anyone drew themselves or a blocked
//! partner. Attempts are capped so impossible constraints surface as
//! [`SantaError::MatchingInfeasible`] instead of spinning forever.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::core::types::{BlockedPair, Pair, ParticipantName};
use crate::error::SantaError;

/// Why a candidate permutation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    SelfMatch(ParticipantName),
    Blocked(ParticipantName, ParticipantName),
}

/// Produce a derangement of `names` avoiding every blocked pair.
///
/// Output is in giver order (the order of `names`).
pub fn make_matches<R: Rng + ?Sized>(
    names: &[ParticipantName],
    blocked: &[BlockedPair],
    rng: &mut R,
    max_attempts: u32,
) -> Result<Vec<Pair>, SantaError> {
    if names.len() < 2 {
        return Err(SantaError::InvalidRoster(
            "at least two participants are needed".to_string(),
        ));
    }

    let mut receivers = names.to_vec();
    for attempt in 1..=max_attempts {
        receivers.shuffle(rng);
        match check_candidate(names, &receivers, blocked) {
            Ok(()) => {
                tracing::debug!(attempt, "matching accepted");
                return Ok(names
                    .iter()
                    .zip(&receivers)
                    .map(|(giver, receiver)| Pair {
                        giver: giver.clone(),
                        receiver: receiver.clone(),
                    })
                    .collect());
            }
            Err(Rejection::SelfMatch(who)) => {
                tracing::trace!(attempt, %who, "self match, retrying");
            }
            Err(Rejection::Blocked(giver, receiver)) => {
                tracing::trace!(attempt, %giver, %receiver, "blocked pair, retrying");
            }
        }
    }

    Err(SantaError::MatchingInfeasible {
        attempts: max_attempts,
    })
}

fn check_candidate(
    givers: &[ParticipantName],
    receivers: &[ParticipantName],
    blocked: &[BlockedPair],
) -> Result<(), Rejection> {
    for (giver, receiver) in givers.iter().zip(receivers) {
        if giver == receiver {
            return Err(Rejection::SelfMatch(giver.clone()));
        }
        if blocked.iter().any(|pair| pair.blocks(giver, receiver)) {
            return Err(Rejection::Blocked(giver.clone(), receiver.clone()));
        }
    }
    Ok(())
}
