//! Game creation for `santa setup`: match, persist, invite.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use crate::core::matcher::make_matches;
use crate::core::types::{BlockedPair, GameState, Pair, ParticipantName, RosterEntry};
use crate::dispatch::SenderIdentity;
use crate::error::{SantaError, TransportError};
use crate::io::mailer::Mailer;
use crate::io::state_store::GameStore;
use crate::io::templates::Templates;

#[derive(Debug, Clone, Copy)]
pub struct SetupOptions {
    /// Preview the matching; nothing is saved or sent.
    pub dry_run: bool,
    /// Replace an existing game.
    pub force: bool,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteEvent {
    Invited {
        name: ParticipantName,
        email: String,
    },
    Failed {
        name: ParticipantName,
        error: TransportError,
    },
}

#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub state: GameState,
    /// Empty for dry runs.
    pub invites: Vec<InviteEvent>,
    pub dry_run: bool,
}

impl SetupOutcome {
    /// Matched pairs, for the operator's dry-run preview.
    pub fn pairs(&self) -> Vec<Pair> {
        self.state.pairs().collect()
    }

    pub fn failures(&self) -> usize {
        self.invites
            .iter()
            .filter(|event| matches!(event, InviteEvent::Failed { .. }))
            .count()
    }
}

/// Create a new game and ask every participant for a wishlist.
#[allow(clippy::too_many_arguments)]
pub fn setup_game<S: GameStore, M: Mailer, R: Rng + ?Sized>(
    store: &S,
    mailer: &M,
    templates: &Templates,
    sender: &SenderIdentity,
    roster: &[RosterEntry],
    blocked: &[BlockedPair],
    rng: &mut R,
    options: SetupOptions,
) -> Result<SetupOutcome> {
    if !options.dry_run && !options.force && store.exists() {
        return Err(SantaError::GameAlreadyExists {
            path: store.location(),
        }
        .into());
    }

    let names: Vec<ParticipantName> = roster.iter().map(|entry| entry.name.clone()).collect();
    let pairs = make_matches(&names, blocked, rng, options.max_attempts)?;
    let state = GameState::new(&pairs, roster, Utc::now());
    info!(
        participants = roster.len(),
        blocked = blocked.len(),
        dry_run = options.dry_run,
        "game matched"
    );

    if options.dry_run {
        return Ok(SetupOutcome {
            state,
            invites: Vec::new(),
            dry_run: true,
        });
    }

    store.save(&state).context("save new game")?;

    let request = templates.wishlist_request()?;
    let mut invites = Vec::with_capacity(roster.len());
    for entry in roster {
        let mail = sender.address(&entry.email, request.subject.clone(), request.body.clone());
        match mailer.send(&mail) {
            Ok(()) => {
                info!(name = %entry.name, "wishlist request sent");
                invites.push(InviteEvent::Invited {
                    name: entry.name.clone(),
                    email: entry.email.clone(),
                });
            }
            Err(error) => {
                warn!(name = %entry.name, %error, "wishlist request failed");
                invites.push(InviteEvent::Failed {
                    name: entry.name.clone(),
                    error,
                });
            }
        }
    }

    Ok(SetupOutcome {
        state,
        invites,
        dry_run: false,
    })
}
