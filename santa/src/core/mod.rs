//! Deterministic, pure logic for the gift exchange.
//!
//! Core modules must be free of I/O side effects. Randomness enters only
//! through the caller-supplied RNG handed to the matcher.

pub mod attribution;
pub mod gate;
pub mod invariants;
pub mod matcher;
pub mod report;
pub mod types;
