//! Console rendering for `santa status` and the post-collect summary.
//!
//! Everything here is built from the participant map alone, never from
//! `assignments`.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::core::report::{StatusReport, status_report};
use crate::core::types::{Participant, ParticipantName};
use crate::io::state_store::GameStore;

/// Load the game and render the received/pending report.
pub fn status_from_store<S: GameStore>(store: &S) -> Result<(StatusReport, String)> {
    let state = store.load()?;
    let report = status_report(&state.participants);
    let text = render_status(&report, &state.participants);
    Ok((report, text))
}

pub fn render_status(
    report: &StatusReport,
    participants: &BTreeMap<ParticipantName, Participant>,
) -> String {
    let mut out = format!(
        "✅ WISHLISTS RECEIVED ({}/{})\n",
        report.received.len(),
        report.total()
    );
    for name in &report.received {
        out.push_str(&format!("  - {}\n", name.display_name()));
    }

    if report.all_received() {
        out.push_str("\n🎉 ALL WISHLISTS RECEIVED\n");
        return out;
    }

    out.push_str(&format!("\n⏳ STILL WAITING ({})\n", report.pending.len()));
    for name in &report.pending {
        let email = participants.get(name).map_or("", |p| p.email.as_str());
        out.push_str(&format!("  - {} <{}>\n", name.display_name(), email));
    }
    out
}

/// Count-only line printed after a real collect run.
pub fn render_summary(report: &StatusReport) -> String {
    format!(
        "{}/{} wishlists received",
        report.received.len(),
        report.total()
    )
}
