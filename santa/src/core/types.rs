//! Shared deterministic types for the gift exchange.
//!
//! Maps are `BTreeMap` so serialized state and iteration order are stable
//! across runs.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SantaError;

/// Case-insensitive participant identifier.
///
/// Stored trimmed and lowercased, so `"Alice"`, `" alice "` and `"ALICE"` are
/// the same participant everywhere: assignment keys, blocked pairs and
/// operator-supplied names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantName(String);

impl ParticipantName {
    pub fn parse(raw: &str) -> Result<Self, SantaError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return Err(SantaError::InvalidName(raw.to_string()));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name with the first letter capitalized, for message bodies.
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl TryFrom<String> for ParticipantName {
    type Error = SantaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ParticipantName> for String {
    fn from(value: ParticipantName) -> Self {
        value.0
    }
}

impl fmt::Display for ParticipantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-participant progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub email: String,
    pub wishlist_received: bool,
    /// Set once, together with `wishlist_received`; never overwritten.
    pub wishlist_content: Option<String>,
    /// Set once the participant has been sent their own assignment as giver.
    pub assignment_sent: bool,
}

impl Participant {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            wishlist_received: false,
            wishlist_content: None,
            assignment_sent: false,
        }
    }

    pub fn email_matches(&self, address: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(address.trim())
    }
}

/// One giver → receiver edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pair {
    pub giver: ParticipantName,
    pub receiver: ParticipantName,
}

/// Unordered pair of participants who must not be matched with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedPair(ParticipantName, ParticipantName);

impl BlockedPair {
    pub fn new(a: ParticipantName, b: ParticipantName) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn blocks(&self, giver: &ParticipantName, receiver: &ParticipantName) -> bool {
        (&self.0 == giver && &self.1 == receiver) || (&self.0 == receiver && &self.1 == giver)
    }
}

/// Roster entry handed to setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: ParticipantName,
    pub email: String,
}

/// The whole game: who buys for whom, and where everyone stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// giver → receiver. Fixed once the game is created.
    #[serde(deserialize_with = "unique_name_map")]
    pub assignments: BTreeMap<ParticipantName, ParticipantName>,
    #[serde(deserialize_with = "unique_name_map")]
    pub participants: BTreeMap<ParticipantName, Participant>,
    /// Written as RFC 3339; offset-less timestamps are read as UTC.
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl GameState {
    /// Fresh state with every wishlist and assignment flag cleared.
    pub fn new(pairs: &[Pair], roster: &[RosterEntry], created_at: DateTime<Utc>) -> Self {
        let assignments = pairs
            .iter()
            .map(|pair| (pair.giver.clone(), pair.receiver.clone()))
            .collect();
        let participants = roster
            .iter()
            .map(|entry| (entry.name.clone(), Participant::new(entry.email.clone())))
            .collect();
        Self {
            assignments,
            participants,
            created_at,
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = Pair> + '_ {
        self.assignments.iter().map(|(giver, receiver)| Pair {
            giver: giver.clone(),
            receiver: receiver.clone(),
        })
    }

    pub fn participant(&self, name: &ParticipantName) -> Option<&Participant> {
        self.participants.get(name)
    }

    /// Resolve an operator-supplied name, case-insensitively.
    pub fn resolve_name(&self, raw: &str) -> Result<ParticipantName, SantaError> {
        let not_found = || SantaError::ParticipantNotFound {
            name: raw.to_string(),
            available: self.available_names(),
        };
        let name = ParticipantName::parse(raw).map_err(|_| not_found())?;
        if self.participants.contains_key(&name) {
            Ok(name)
        } else {
            Err(not_found())
        }
    }

    /// Giver whose receiver is `receiver`.
    pub fn giver_for(&self, receiver: &ParticipantName) -> Option<&ParticipantName> {
        self.assignments
            .iter()
            .find(|(_, r)| *r == receiver)
            .map(|(giver, _)| giver)
    }

    pub fn received_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.wishlist_received)
            .count()
    }

    fn available_names(&self) -> String {
        self.participants
            .keys()
            .map(ParticipantName::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse an ISO-8601 timestamp, treating a missing offset as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("{raw:?} is not an ISO-8601 timestamp: {err}"))
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(de::Error::custom)
}

/// Name-keyed map that refuses keys colliding after normalization.
fn unique_name_map<'de, D, V>(deserializer: D) -> Result<BTreeMap<ParticipantName, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct NameMap<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for NameMap<V> {
        type Value = BTreeMap<ParticipantName, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map keyed by participant name")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((raw, value)) = access.next_entry::<String, V>()? {
                let name = ParticipantName::parse(&raw).map_err(de::Error::custom)?;
                if map.contains_key(&name) {
                    return Err(de::Error::custom(format!(
                        "duplicate participant name {raw:?} (names are case-insensitive)"
                    )));
                }
                map.insert(name, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(NameMap(PhantomData))
}
