//! Wishlist collection for `santa collect`.
//!
//! Each new wishlist is persisted before the next message is looked at, so an
//! interrupted run keeps everything it had already recorded.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::attribution::{Attribution, attribute};
use crate::core::types::{GameState, ParticipantName};
use crate::error::{SantaError, TransportError};
use crate::io::inbox::{Inbox, MessageHandle};
use crate::io::state_store::GameStore;

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Only messages whose subject contains this are considered.
    pub subject_filter: String,
    /// Report what would change without saving or marking anything read.
    pub dry_run: bool,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectEvent {
    /// First wishlist from this participant (recorded unless dry run).
    NewWishlist {
        name: ParticipantName,
        email: String,
        preview: String,
    },
    /// Participant already has a wishlist; the message is ignored.
    AlreadyReceived { name: ParticipantName },
    /// Sender is not a participant.
    UnknownSender { address: String },
    /// Message could not be fetched; left unread for the next run.
    FetchFailed {
        handle: MessageHandle,
        error: TransportError,
    },
    /// Wishlist was recorded but the message could not be marked read.
    MarkReadFailed {
        handle: MessageHandle,
        error: TransportError,
    },
}

#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub state: GameState,
    pub events: Vec<CollectEvent>,
    /// Number of messages the search matched.
    pub matched: usize,
    pub dry_run: bool,
}

impl CollectOutcome {
    pub fn new_wishlists(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, CollectEvent::NewWishlist { .. }))
            .count()
    }

    pub fn transport_failures(&self) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    CollectEvent::FetchFailed { .. } | CollectEvent::MarkReadFailed { .. }
                )
            })
            .count()
    }
}

/// Scan `inbox` for replies and record first-time wishlists into `state`.
///
/// Per-message transport failures are reported as events and never stop the
/// batch. A failed search or a failed save aborts the run.
pub fn collect_wishlists<S: GameStore, I: Inbox>(
    store: &S,
    inbox: &I,
    mut state: GameState,
    options: &CollectOptions,
) -> Result<CollectOutcome> {
    let handles = inbox
        .search_unread(&options.subject_filter)
        .map_err(SantaError::from)
        .context("search inbox")?;
    info!(matched = handles.len(), dry_run = options.dry_run, "collecting wishlists");

    let mut events = Vec::new();
    // Dry runs don't mutate `state`, so track would-be submissions here.
    let mut pending_in_dry_run: BTreeSet<ParticipantName> = BTreeSet::new();

    for handle in &handles {
        let message = match inbox.fetch(handle) {
            Ok(message) => message,
            Err(error) => {
                warn!(%handle, %error, "fetch failed");
                events.push(CollectEvent::FetchFailed {
                    handle: handle.clone(),
                    error,
                });
                continue;
            }
        };

        let attribution = match attribute(&state, &message.from_address) {
            Attribution::New(name) if pending_in_dry_run.contains(&name) => {
                Attribution::AlreadyReceived(name)
            }
            other => other,
        };

        match attribution {
            Attribution::UnknownSender => {
                debug!(address = %message.from_address, "sender not a participant");
                events.push(CollectEvent::UnknownSender {
                    address: message.from_address,
                });
            }
            Attribution::AlreadyReceived(name) => {
                debug!(%name, "wishlist already on file");
                if !options.dry_run {
                    mark_read(inbox, handle, &mut events);
                }
                events.push(CollectEvent::AlreadyReceived { name });
            }
            Attribution::New(name) => {
                let preview = preview(&message.body);
                let email = message.from_address.clone();
                if options.dry_run {
                    pending_in_dry_run.insert(name.clone());
                } else {
                    record_wishlist(&mut state, &name, message.body)?;
                    store
                        .save(&state)
                        .with_context(|| format!("save wishlist from {}", name))?;
                    info!(%name, "wishlist recorded");
                    mark_read(inbox, handle, &mut events);
                }
                events.push(CollectEvent::NewWishlist {
                    name,
                    email,
                    preview,
                });
            }
        }
    }

    Ok(CollectOutcome {
        state,
        events,
        matched: handles.len(),
        dry_run: options.dry_run,
    })
}

fn record_wishlist(state: &mut GameState, name: &ParticipantName, body: String) -> Result<()> {
    let participant = state
        .participants
        .get_mut(name)
        .with_context(|| format!("participant {} vanished from state", name))?;
    participant.wishlist_received = true;
    participant.wishlist_content = Some(body);
    Ok(())
}

fn mark_read<I: Inbox>(inbox: &I, handle: &MessageHandle, events: &mut Vec<CollectEvent>) {
    if let Err(error) = inbox.mark_read(handle) {
        warn!(%handle, %error, "mark read failed");
        events.push(CollectEvent::MarkReadFailed {
            handle: handle.clone(),
            error,
        });
    }
}

fn preview(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    }
}
