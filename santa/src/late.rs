//! Forwarding a late wishlist to the giver who already has their assignment.
//!
//! Read-only with respect to game state. The outcome names the receiver only;
//! the giver stays secret from the operator.

use anyhow::{Context, Result};
use tracing::info;

use crate::core::types::{GameState, ParticipantName};
use crate::dispatch::{SenderIdentity, participant_email};
use crate::error::SantaError;
use crate::io::mailer::{Mailer, OutgoingMail};
use crate::io::templates::Templates;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateOutcome {
    pub receiver: ParticipantName,
    /// Present only for dry runs, so the operator can preview the body.
    pub preview: Option<OutgoingMail>,
}

pub fn send_late_wishlist<M: Mailer>(
    mailer: &M,
    templates: &Templates,
    sender: &SenderIdentity,
    state: &GameState,
    raw_name: &str,
    dry_run: bool,
) -> Result<LateOutcome> {
    let receiver = state.resolve_name(raw_name)?;
    let wishlist = state
        .participant(&receiver)
        .filter(|p| p.wishlist_received)
        .and_then(|p| p.wishlist_content.clone())
        .ok_or_else(|| SantaError::WishlistMissing {
            name: receiver.display_name(),
        })?;
    let giver = state
        .giver_for(&receiver)
        .with_context(|| format!("nobody is assigned to {}", receiver))?;

    let composed = templates.late_wishlist(&receiver, &wishlist)?;
    let mail = sender.address(
        &participant_email(state, giver)?,
        composed.subject,
        composed.body,
    );

    if dry_run {
        return Ok(LateOutcome {
            receiver,
            preview: Some(mail),
        });
    }

    mailer.send(&mail).map_err(SantaError::from)?;
    info!(%receiver, "late wishlist forwarded");
    Ok(LateOutcome {
        receiver,
        preview: None,
    })
}
