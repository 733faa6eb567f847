//! Test-only helpers: game state builders and scripted transport doubles.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;
use chrono::{TimeZone, Utc};

use crate::core::types::{GameState, Pair, ParticipantName, RosterEntry};
use crate::error::{SantaError, TransportError};
use crate::io::inbox::{Inbox, InboundMessage, MessageHandle};
use crate::io::mailer::{Mailer, OutgoingMail};
use crate::io::state_store::GameStore;

pub fn name(raw: &str) -> ParticipantName {
    ParticipantName::parse(raw).expect("valid test name")
}

pub fn names(raw: &[&str]) -> Vec<ParticipantName> {
    raw.iter().map(|n| name(n)).collect()
}

/// Deterministic state from `(giver, receiver)` pairs; emails are `<name>@example.com`.
pub fn game_state(pairs: &[(&str, &str)]) -> GameState {
    let pairs: Vec<Pair> = pairs
        .iter()
        .map(|(giver, receiver)| Pair {
            giver: name(giver),
            receiver: name(receiver),
        })
        .collect();
    let roster: Vec<RosterEntry> = pairs
        .iter()
        .map(|pair| RosterEntry {
            name: pair.giver.clone(),
            email: format!("{}@example.com", pair.giver),
        })
        .collect();
    let created_at = Utc
        .with_ymd_and_hms(2026, 12, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp");
    GameState::new(&pairs, &roster, created_at)
}

pub fn receive_wishlist(state: &mut GameState, who: &str, content: &str) {
    let participant = state
        .participants
        .get_mut(&name(who))
        .expect("participant exists");
    participant.wishlist_received = true;
    participant.wishlist_content = Some(content.to_string());
}

pub fn mark_sent(state: &mut GameState, who: &str) {
    state
        .participants
        .get_mut(&name(who))
        .expect("participant exists")
        .assignment_sent = true;
}

/// In-memory [`GameStore`] counting saves.
#[derive(Default)]
pub struct MemoryStore {
    state: RefCell<Option<GameState>>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn with_state(state: GameState) -> Self {
        Self {
            state: RefCell::new(Some(state)),
            saves: Cell::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> Option<GameState> {
        self.state.borrow().clone()
    }
}

impl GameStore for MemoryStore {
    fn location(&self) -> PathBuf {
        PathBuf::from("memory")
    }

    fn exists(&self) -> bool {
        self.state.borrow().is_some()
    }

    fn load(&self) -> Result<GameState> {
        self.state.borrow().clone().ok_or_else(|| {
            SantaError::StateNotFound {
                path: self.location(),
            }
            .into()
        })
    }

    fn save(&self, state: &GameState) -> Result<()> {
        *self.state.borrow_mut() = Some(state.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Records every message; recipients in `failing` get a transport error instead.
#[derive(Default)]
pub struct ScriptedMailer {
    sent: RefCell<Vec<OutgoingMail>>,
    failing: RefCell<BTreeSet<String>>,
}

impl ScriptedMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        self.failing.borrow_mut().insert(address.to_lowercase());
    }

    pub fn recover(&self) {
        self.failing.borrow_mut().clear();
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.borrow().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|m| m.to.clone()).collect()
    }
}

impl Mailer for ScriptedMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        if self.failing.borrow().contains(&mail.to.to_lowercase()) {
            return Err(TransportError::timeout(format!("scripted failure for {}", mail.to)));
        }
        self.sent.borrow_mut().push(mail.clone());
        Ok(())
    }
}

struct ScriptedMessage {
    subject: String,
    from: String,
    body: String,
    seen: bool,
    fetch_fails: bool,
}

/// In-memory [`Inbox`] with read flags.
#[derive(Default)]
pub struct ScriptedInbox {
    messages: RefCell<BTreeMap<String, ScriptedMessage>>,
    next_id: Cell<u32>,
}

impl ScriptedInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, from: &str, subject: &str, body: &str) -> MessageHandle {
        self.push(from, subject, body, false)
    }

    /// Message that matches searches but cannot be fetched.
    pub fn deliver_broken(&self, from: &str, subject: &str) -> MessageHandle {
        self.push(from, subject, "", true)
    }

    pub fn is_seen(&self, handle: &MessageHandle) -> bool {
        self.messages
            .borrow()
            .get(&handle.0)
            .is_some_and(|message| message.seen)
    }

    pub fn unseen_count(&self) -> usize {
        self.messages.borrow().values().filter(|m| !m.seen).count()
    }

    fn push(&self, from: &str, subject: &str, body: &str, fetch_fails: bool) -> MessageHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let key = format!("msg-{id:04}");
        self.messages.borrow_mut().insert(
            key.clone(),
            ScriptedMessage {
                subject: subject.to_string(),
                from: from.to_string(),
                body: body.to_string(),
                seen: false,
                fetch_fails,
            },
        );
        MessageHandle(key)
    }
}

impl Inbox for ScriptedInbox {
    fn search_unread(&self, subject_contains: &str) -> Result<Vec<MessageHandle>, TransportError> {
        let needle = subject_contains.to_lowercase();
        Ok(self
            .messages
            .borrow()
            .iter()
            .filter(|(_, m)| !m.seen && m.subject.to_lowercase().contains(&needle))
            .map(|(key, _)| MessageHandle(key.clone()))
            .collect())
    }

    fn fetch(&self, handle: &MessageHandle) -> Result<InboundMessage, TransportError> {
        let messages = self.messages.borrow();
        let message = messages
            .get(&handle.0)
            .ok_or_else(|| TransportError::malformed(format!("no message {}", handle)))?;
        if message.fetch_fails {
            return Err(TransportError::connection(format!("scripted fetch failure {}", handle)));
        }
        Ok(InboundMessage {
            from_address: message.from.clone(),
            body: message.body.clone(),
        })
    }

    fn mark_read(&self, handle: &MessageHandle) -> Result<(), TransportError> {
        let mut messages = self.messages.borrow_mut();
        let message = messages
            .get_mut(&handle.0)
            .ok_or_else(|| TransportError::malformed(format!("no message {}", handle)))?;
        message.seen = true;
        Ok(())
    }
}
