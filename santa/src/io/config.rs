//! Game configuration stored in `santa.toml`.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::core::types::{BlockedPair, ParticipantName, RosterEntry};
use crate::error::SantaError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s<>]+@[^@\s<>]+\.[^@\s<>]+$").expect("email regex"));

/// Game configuration (TOML).
///
/// Edited by the organizer before `santa setup`. Missing fields default to
/// values that work with a local `sendmail` and `~/Maildir`-style inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SantaConfig {
    /// Game state file, relative to the config file's directory.
    pub state_path: PathBuf,

    /// Only unread messages whose subject contains this are treated as wishlists.
    pub subject_filter: String,

    /// Retry ceiling for the matcher.
    pub max_match_attempts: u32,

    /// Pairs that must never be matched with each other, in either direction.
    pub blocked_pairs: Vec<[String; 2]>,

    pub mail: MailConfig,

    pub inbox: InboxConfig,

    pub participants: Vec<ParticipantConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailConfig {
    pub from_display_name: String,
    pub from_address: String,
    pub reply_to: Option<String>,
    /// Person to ask questions, named at the bottom of every email.
    pub contact_name: Option<String>,
    pub gift_budget: String,
    /// Command that accepts an RFC 5322 message on stdin (e.g. `sendmail -t -i`).
    pub send_command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_display_name: "Santa's Workshop".to_string(),
            from_address: "santa@example.com".to_string(),
            reply_to: None,
            contact_name: None,
            gift_budget: "$10".to_string(),
            send_command: vec!["sendmail".to_string(), "-t".to_string(), "-i".to_string()],
            timeout_secs: 30,
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InboxConfig {
    /// Maildir holding replies (`new/`, `cur/`, `tmp/`), relative to the config file's directory.
    pub maildir: PathBuf,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            maildir: PathBuf::from("Maildir"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantConfig {
    pub name: String,
    pub email: String,
}

impl Default for SantaConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".santa/game_state.json"),
            subject_filter: "Secret Santa".to_string(),
            max_match_attempts: 1000,
            blocked_pairs: Vec::new(),
            mail: MailConfig::default(),
            inbox: InboxConfig::default(),
            participants: Vec::new(),
        }
    }
}

impl SantaConfig {
    /// Starter config written by `santa init`.
    pub fn starter() -> Self {
        let participants = [
            ("alice", "alice@example.com"),
            ("bob", "bob@example.com"),
            ("chris", "chris@example.com"),
            ("dina", "dina@example.com"),
        ]
        .into_iter()
        .map(|(name, email)| ParticipantConfig {
            name: name.to_string(),
            email: email.to_string(),
        })
        .collect();
        Self {
            participants,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_match_attempts == 0 {
            return Err(anyhow!("max_match_attempts must be > 0"));
        }
        if self.mail.timeout_secs == 0 {
            return Err(anyhow!("mail.timeout_secs must be > 0"));
        }
        if self.mail.send_command.is_empty() || self.mail.send_command[0].trim().is_empty() {
            return Err(anyhow!("mail.send_command must be a non-empty array"));
        }
        if self.subject_filter.trim().is_empty() {
            return Err(anyhow!("subject_filter must not be empty"));
        }
        if !EMAIL_RE.is_match(&self.mail.from_address) {
            return Err(anyhow!(
                "mail.from_address {:?} is not an email address",
                self.mail.from_address
            ));
        }
        Ok(())
    }

    /// Validated participant list for setup.
    pub fn roster(&self) -> Result<Vec<RosterEntry>, SantaError> {
        if self.participants.len() < 2 {
            return Err(SantaError::InvalidRoster(
                "at least two participants are needed".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        let mut emails = BTreeSet::new();
        let mut roster = Vec::with_capacity(self.participants.len());
        for entry in &self.participants {
            let name = ParticipantName::parse(&entry.name)?;
            let email = entry.email.trim().to_string();
            if !EMAIL_RE.is_match(&email) {
                return Err(SantaError::InvalidRoster(format!(
                    "{}: {:?} is not an email address",
                    name, entry.email
                )));
            }
            if !names.insert(name.clone()) {
                return Err(SantaError::InvalidRoster(format!(
                    "duplicate participant name {}",
                    name
                )));
            }
            if !emails.insert(email.to_lowercase()) {
                return Err(SantaError::InvalidRoster(format!(
                    "duplicate participant email {}",
                    email
                )));
            }
            roster.push(RosterEntry { name, email });
        }
        Ok(roster)
    }

    /// Validated blocked pairs; both members must be on the roster.
    pub fn blocked(&self, roster: &[RosterEntry]) -> Result<Vec<BlockedPair>, SantaError> {
        self.blocked_pairs
            .iter()
            .map(|[a, b]| {
                let a = ParticipantName::parse(a)?;
                let b = ParticipantName::parse(b)?;
                if a == b {
                    return Err(SantaError::InvalidRoster(format!(
                        "blocked pair names {} twice",
                        a
                    )));
                }
                for member in [&a, &b] {
                    if !roster.iter().any(|entry| &entry.name == member) {
                        return Err(SantaError::InvalidRoster(format!(
                            "blocked pair names unknown participant {}",
                            member
                        )));
                    }
                }
                Ok(BlockedPair::new(a, b))
            })
            .collect()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SantaConfig::default()`.
pub fn load_config(path: &Path) -> Result<SantaConfig> {
    if !path.exists() {
        let cfg = SantaConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SantaConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SantaConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp config in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp config {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
