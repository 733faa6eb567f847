//! Secret Santa organizer.
//!
//! Pairs participants at random, collects wishlists from email replies, and
//! only reveals a giver's assignment once both sides of the pairing have sent
//! a wishlist. The layout keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (matching, invariants, the
//!   dispatch gate, sender attribution, status projection). No I/O.
//! - **[`io`]**: Side effects (config, game state file, mail transport,
//!   maildir inbox, templates). Behind traits so tests can swap in doubles.
//!
//! Orchestration modules ([`setup`], [`collect`], [`dispatch`], [`late`],
//! [`status`]) combine the two to implement CLI commands.

pub mod collect;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod late;
pub mod logging;
pub mod setup;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
