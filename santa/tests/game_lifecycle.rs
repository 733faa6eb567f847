//! End-to-end game scenarios over the public API.
//!
//! State lives in a real JSON file and replies in a real Maildir inside a
//! temp directory; only outgoing mail is scripted.

use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use santa::collect::{CollectOptions, collect_wishlists};
use santa::core::gate::DispatchMode;
use santa::core::report::status_report;
use santa::core::types::RosterEntry;
use santa::dispatch::{DispatchOptions, SenderIdentity, dispatch_assignments};
use santa::error::SantaError;
use santa::io::inbox::MaildirInbox;
use santa::io::state_store::{GameStore, JsonFileStore};
use santa::io::templates::Templates;
use santa::late::send_late_wishlist;
use santa::setup::{SetupOptions, setup_game};
use santa::status::status_from_store;
use santa::test_support::{ScriptedMailer, game_state, name};

fn sender() -> SenderIdentity {
    SenderIdentity {
        display_name: "Santa's Workshop".to_string(),
        reply_to: None,
    }
}

fn collect_options() -> CollectOptions {
    CollectOptions {
        subject_filter: "Secret Santa".to_string(),
        dry_run: false,
    }
}

fn deliver(maildir: &Path, file: &str, from: &str, body: &str) {
    let new = maildir.join("new");
    fs::create_dir_all(&new).expect("create new/");
    fs::create_dir_all(maildir.join("cur")).expect("create cur/");
    let raw = format!(
        "From: {from}\r\nTo: santa@example.com\r\nSubject: Re: Secret Santa - Send Your Wishlist\r\n\r\n{body}\r\n"
    );
    fs::write(new.join(file), raw).expect("write message");
}

/// a→b, b→c, c→d, d→a saved to disk.
fn ring_on_disk(root: &Path) -> JsonFileStore {
    let store = JsonFileStore::new(root.join(".santa/game_state.json"));
    store
        .save(&game_state(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")]))
        .expect("save ring");
    store
}

#[test]
fn wishlists_gate_assignments_then_force_finishes_the_game() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = ring_on_disk(temp.path());
    let maildir = temp.path().join("Maildir");
    let inbox = MaildirInbox::new(&maildir);
    let templates = Templates::new("$10", Some("Asmara".to_string()));
    let mailer = ScriptedMailer::new();

    deliver(&maildir, "1000.b.host", "Bee <B@Example.com>", "books please");
    deliver(&maildir, "1001.c.host", "c@example.com", "candles");
    deliver(&maildir, "1002.x.host", "stranger@example.org", "hello?");

    let collected = collect_wishlists(
        &store,
        &inbox,
        store.load().expect("load"),
        &collect_options(),
    )
    .expect("collect");
    assert_eq!(collected.new_wishlists(), 2);
    assert!(maildir.join("new/1002.x.host").exists());
    assert!(!maildir.join("new/1000.b.host").exists());

    let state = store.load().expect("reload");
    let report = status_report(&state.participants);
    assert_eq!(report.received, vec![name("b"), name("c")]);

    let gated = dispatch_assignments(
        &store,
        &mailer,
        &templates,
        &sender(),
        state,
        DispatchOptions::default(),
    )
    .expect("gated send");
    assert_eq!(gated.sent(), 1);
    assert_eq!(mailer.recipients(), vec!["b@example.com"]);
    assert!(mailer.sent()[0].body.contains("candles"));

    let again = dispatch_assignments(
        &store,
        &mailer,
        &templates,
        &sender(),
        store.load().expect("reload"),
        DispatchOptions::default(),
    )
    .expect("gated send again");
    assert_eq!(again.sent(), 0);

    let forced = dispatch_assignments(
        &store,
        &mailer,
        &templates,
        &sender(),
        store.load().expect("reload"),
        DispatchOptions {
            mode: DispatchMode::Forced,
            dry_run: false,
        },
    )
    .expect("forced send");
    assert_eq!(forced.sent(), 3);
    let sent = mailer.sent();
    assert_eq!(
        mailer.recipients(),
        vec![
            "b@example.com",
            "a@example.com",
            "c@example.com",
            "d@example.com"
        ]
    );
    assert!(sent[1].body.contains("books please"));
    assert!(sent[2].body.contains("D's letter never made it"));
    assert!(sent[3].body.contains("A's letter never made it"));

    let finished = store.load().expect("reload");
    assert!(finished.participants.values().all(|p| p.assignment_sent));
}

#[test]
fn late_wishlist_reaches_the_giver_after_forced_send() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = ring_on_disk(temp.path());
    let maildir = temp.path().join("Maildir");
    let inbox = MaildirInbox::new(&maildir);
    let templates = Templates::new("$10", None);
    let mailer = ScriptedMailer::new();

    dispatch_assignments(
        &store,
        &mailer,
        &templates,
        &sender(),
        store.load().expect("load"),
        DispatchOptions {
            mode: DispatchMode::Forced,
            dry_run: false,
        },
    )
    .expect("forced send");

    deliver(&maildir, "2000.a.host", "a@example.com", "a yoga mat");
    collect_wishlists(
        &store,
        &inbox,
        store.load().expect("load"),
        &collect_options(),
    )
    .expect("collect");

    let state = store.load().expect("reload");
    let outcome =
        send_late_wishlist(&mailer, &templates, &sender(), &state, "A", false).expect("late");
    assert_eq!(outcome.receiver, name("a"));
    let last = mailer.sent().pop().expect("late mail");
    assert_eq!(last.to, "d@example.com");
    assert!(last.body.contains("a yoga mat"));
    assert_eq!(store.load().expect("reload"), state);
}

#[test]
fn setup_persists_a_valid_game_and_refuses_a_second_one() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = JsonFileStore::new(temp.path().join(".santa/game_state.json"));
    let mailer = ScriptedMailer::new();
    let templates = Templates::new("$10", None);
    let roster: Vec<RosterEntry> = ["Alice", "bob", "Chris", "dina"]
        .iter()
        .map(|n| RosterEntry {
            name: name(n),
            email: format!("{}@example.com", n.to_lowercase()),
        })
        .collect();
    let options = SetupOptions {
        dry_run: false,
        force: false,
        max_attempts: 1000,
    };

    setup_game(
        &store,
        &mailer,
        &templates,
        &sender(),
        &roster,
        &[],
        &mut StdRng::seed_from_u64(2026),
        options,
    )
    .expect("setup");
    let loaded = store.load().expect("schema and invariants hold");
    assert_eq!(loaded.assignments.len(), 4);
    assert_eq!(mailer.sent().len(), 4);

    let (_, status) = status_from_store(&store).expect("status");
    assert!(status.contains("(0/4)"));
    for receiver in loaded.assignments.values() {
        let giver = loaded.giver_for(receiver).expect("giver");
        assert!(!status.contains(&format!("{giver} → {receiver}")));
    }

    let err = setup_game(
        &store,
        &mailer,
        &templates,
        &sender(),
        &roster,
        &[],
        &mut StdRng::seed_from_u64(1),
        options,
    )
    .expect_err("second setup");
    assert!(matches!(
        err.downcast_ref::<SantaError>(),
        Some(SantaError::GameAlreadyExists { .. })
    ));
    assert_eq!(store.load().expect("unchanged"), loaded);
}

#[test]
fn commands_without_a_game_report_state_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = JsonFileStore::new(temp.path().join("missing.json"));
    let err = store.load().expect_err("no game");
    assert!(matches!(
        err.downcast_ref::<SantaError>(),
        Some(SantaError::StateNotFound { .. })
    ));
}
