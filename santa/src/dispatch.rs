//! Assignment dispatch for `santa send`.
//!
//! Every successful send flips the giver's `assignment_sent` flag and saves the
//! whole state before the next giver is tried. A re-run after a partial
//! failure only mails givers that are still unsent.

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::core::gate::{Decision, DispatchMode, Letter, SkipReason, Verdict, plan_dispatch};
use crate::core::types::{GameState, ParticipantName};
use crate::error::TransportError;
use crate::io::config::MailConfig;
use crate::io::mailer::{Mailer, OutgoingMail};
use crate::io::state_store::GameStore;
use crate::io::templates::Templates;

/// Sender identity stamped on every outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub display_name: String,
    pub reply_to: Option<String>,
}

impl SenderIdentity {
    pub fn from_config(cfg: &MailConfig) -> Self {
        Self {
            display_name: cfg.from_display_name.clone(),
            reply_to: cfg.reply_to.clone(),
        }
    }

    pub fn address(&self, to: &str, subject: String, body: String) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject,
            body,
            from_display_name: self.display_name.clone(),
            reply_to: self.reply_to.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub mode: DispatchMode,
    /// Compose everything, send nothing, change nothing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Sent {
        giver: ParticipantName,
        email: String,
        letter: Letter,
    },
    /// Dry run: the message that would go out.
    WouldSend {
        giver: ParticipantName,
        mail: OutgoingMail,
        letter: Letter,
    },
    Skipped {
        giver: ParticipantName,
        reason: SkipReason,
    },
    /// Transport failed; the giver stays unsent for the next run.
    Failed {
        giver: ParticipantName,
        error: TransportError,
    },
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub state: GameState,
    pub events: Vec<DispatchEvent>,
    pub dry_run: bool,
}

impl DispatchOutcome {
    pub fn sent(&self) -> usize {
        self.count(|event| matches!(event, DispatchEvent::Sent { .. }))
    }

    pub fn would_send(&self) -> usize {
        self.count(|event| matches!(event, DispatchEvent::WouldSend { .. }))
    }

    pub fn failures(&self) -> usize {
        self.count(|event| matches!(event, DispatchEvent::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&DispatchEvent) -> bool) -> usize {
        self.events.iter().filter(|event| pred(event)).count()
    }
}

/// Send every assignment the gate currently allows.
pub fn dispatch_assignments<S: GameStore, M: Mailer>(
    store: &S,
    mailer: &M,
    templates: &Templates,
    sender: &SenderIdentity,
    mut state: GameState,
    options: DispatchOptions,
) -> Result<DispatchOutcome> {
    let decisions = plan_dispatch(&state, options.mode);
    info!(mode = ?options.mode, dry_run = options.dry_run, givers = decisions.len(), "dispatching assignments");

    let mut events = Vec::with_capacity(decisions.len());
    for Decision { pair, verdict } in decisions {
        let letter = match verdict {
            Verdict::Skip(reason) => {
                events.push(DispatchEvent::Skipped {
                    giver: pair.giver,
                    reason,
                });
                continue;
            }
            Verdict::Send(letter) => letter,
        };

        let giver_email = participant_email(&state, &pair.giver)?;
        let wishlist = match letter {
            Letter::WithWishlist => Some(
                state
                    .participant(&pair.receiver)
                    .and_then(|p| p.wishlist_content.clone())
                    .unwrap_or_default(),
            ),
            Letter::MissingWishlist => None,
        };
        let composed = templates.assignment(&pair.receiver, wishlist.as_deref())?;
        let mail = sender.address(&giver_email, composed.subject, composed.body);

        if options.dry_run {
            events.push(DispatchEvent::WouldSend {
                giver: pair.giver,
                mail,
                letter,
            });
            continue;
        }

        match mailer.send(&mail) {
            Ok(()) => {
                if let Some(giver) = state.participants.get_mut(&pair.giver) {
                    giver.assignment_sent = true;
                }
                store
                    .save(&state)
                    .with_context(|| format!("save after sending to {}", pair.giver))?;
                info!(giver = %pair.giver, ?letter, "assignment sent");
                events.push(DispatchEvent::Sent {
                    giver: pair.giver,
                    email: giver_email,
                    letter,
                });
            }
            Err(error) => {
                warn!(giver = %pair.giver, %error, "assignment send failed");
                events.push(DispatchEvent::Failed {
                    giver: pair.giver,
                    error,
                });
            }
        }
    }

    Ok(DispatchOutcome {
        state,
        events,
        dry_run: options.dry_run,
    })
}

pub(crate) fn participant_email(state: &GameState, name: &ParticipantName) -> Result<String> {
    state
        .participant(name)
        .map(|p| p.email.clone())
        .ok_or_else(|| anyhow!("participant {} missing from state", name))
}
