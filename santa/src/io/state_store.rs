//! Game state persistence.
//!
//! There is no in-memory cache: every load reads the file and every save
//! replaces it whole. Saves go through a uniquely named temp file + rename so
//! a concurrent `santa status` never observes a half-written record.
//! Concurrent writers are last-writer-wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::core::types::GameState;
use crate::error::SantaError;

const GAME_STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/game_state/v1.schema.json"
));

/// Load/save seam for the single game record.
pub trait GameStore {
    /// Where the record lives, for error messages.
    fn location(&self) -> PathBuf;
    fn exists(&self) -> bool;
    /// Fails with [`SantaError::StateNotFound`] when no game has been set up.
    fn load(&self) -> Result<GameState>;
    fn save(&self, state: &GameState) -> Result<()>;
}

/// Pretty-printed JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GameStore for JsonFileStore {
    fn location(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> Result<GameState> {
        load_game_state(&self.path)
    }

    fn save(&self, state: &GameState) -> Result<()> {
        write_game_state(&self.path, state)
    }
}

/// Load and validate game state from disk (schema + invariants).
pub fn load_game_state(path: &Path) -> Result<GameState> {
    debug!(path = %path.display(), "loading game state");
    if !path.exists() {
        return Err(SantaError::StateNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read game state {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse game state {}", path.display()))?;
    validate_schema(&value)?;
    let state: GameState = serde_json::from_value(value)
        .with_context(|| format!("deserialize game state {}", path.display()))?;
    validate_state_invariants(&state)?;
    debug!(
        participants = state.participants.len(),
        received = state.received_count(),
        "game state loaded"
    );
    Ok(state)
}

/// Atomically write game state to disk (temp file + rename).
pub fn write_game_state(path: &Path, state: &GameState) -> Result<()> {
    debug!(path = %path.display(), received = state.received_count(), "writing game state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("game state path missing parent {}", path.display()))?;
    let dir = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        parent
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp game state in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp game state {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace game state {}", path.display()))?;
    Ok(())
}

fn validate_schema(state: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(GAME_STATE_SCHEMA).context("parse state schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(state) {
        let messages = compiled
            .iter_errors(state)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "game state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_state_invariants(state: &GameState) -> Result<()> {
    let errors = validate_invariants(state);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("game state invariants failed: {}", errors.join("; ")))
}
