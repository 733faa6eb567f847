//! Assignment gate: which givers may be told their receiver right now.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{GameState, Pair};

/// How strictly the wishlist gate is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Giver and receiver must both have sent a wishlist.
    #[default]
    Gated,
    /// Only unsent assignments matter; missing wishlists get a notice instead.
    Forced,
}

/// Which assignment message the giver gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Letter {
    /// Receiver's wishlist is included.
    WithWishlist,
    /// Receiver never sent one; the giver is told so.
    MissingWishlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GiverPending,
    AlreadySent,
    ReceiverPending,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::GiverPending => "hasn't sent wishlist yet",
            SkipReason::AlreadySent => "already received assignment",
            SkipReason::ReceiverPending => "their recipient hasn't sent wishlist yet",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Send(Letter),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub pair: Pair,
    pub verdict: Verdict,
}

/// Decide, for every giver in giver order, whether an assignment may go out.
///
/// Pairs whose giver or receiver is missing from `participants` are skipped as
/// pending; loaded states never contain them (invariants reject it).
pub fn plan_dispatch(state: &GameState, mode: DispatchMode) -> Vec<Decision> {
    state
        .pairs()
        .map(|pair| {
            let verdict = judge(state, &pair, mode);
            Decision { pair, verdict }
        })
        .collect()
}

fn judge(state: &GameState, pair: &Pair, mode: DispatchMode) -> Verdict {
    let (Some(giver), Some(receiver)) = (
        state.participant(&pair.giver),
        state.participant(&pair.receiver),
    ) else {
        return Verdict::Skip(SkipReason::GiverPending);
    };

    match mode {
        DispatchMode::Gated => {
            if !giver.wishlist_received {
                Verdict::Skip(SkipReason::GiverPending)
            } else if giver.assignment_sent {
                Verdict::Skip(SkipReason::AlreadySent)
            } else if !receiver.wishlist_received {
                Verdict::Skip(SkipReason::ReceiverPending)
            } else {
                Verdict::Send(Letter::WithWishlist)
            }
        }
        DispatchMode::Forced => {
            if giver.assignment_sent {
                Verdict::Skip(SkipReason::AlreadySent)
            } else if receiver.wishlist_received {
                Verdict::Send(Letter::WithWishlist)
            } else {
                Verdict::Send(Letter::MissingWishlist)
            }
        }
    }
}
