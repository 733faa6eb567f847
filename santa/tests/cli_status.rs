//! CLI tests spawning the `santa` binary against a temp directory.
//!
//! Outgoing mail is piped to `cat` so no real sendmail is needed.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use santa::exit_codes;
use santa::io::config::{SantaConfig, write_config};

fn santa(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_santa"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run santa")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_sink_config(dir: &Path) {
    let mut cfg = SantaConfig::starter();
    cfg.mail.send_command = vec!["sh".to_string(), "-c".to_string(), "cat > /dev/null".to_string()];
    write_config(&dir.join("santa.toml"), &cfg).expect("write config");
}

#[test]
fn init_writes_starter_config_once() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = santa(temp.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(temp.path().join("santa.toml")).expect("config");
    assert!(written.contains("alice@example.com"));

    let second = santa(temp.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::FAILED));

    let forced = santa(temp.path(), &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn status_without_a_game_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    santa(temp.path(), &["init"]);

    let output = santa(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("santa setup"));
}

#[test]
fn setup_dry_run_saves_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_sink_config(temp.path());

    let output = santa(temp.path(), &["setup", "--dry-run"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).matches('→').count(), 4);
    assert!(!temp.path().join(".santa/game_state.json").exists());
}

#[test]
fn setup_collect_and_status_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_sink_config(temp.path());

    let setup = santa(temp.path(), &["setup"]);
    assert_eq!(setup.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join(".santa/game_state.json").exists());

    let again = santa(temp.path(), &["setup"]);
    assert_eq!(again.status.code(), Some(exit_codes::FAILED));

    let new = temp.path().join("Maildir/new");
    fs::create_dir_all(&new).expect("maildir");
    fs::write(
        new.join("1000.alice.host"),
        "From: Alice <alice@example.com>\r\nSubject: Re: Secret Santa\r\n\r\nknitting needles\r\n",
    )
    .expect("deliver");

    let collect = santa(temp.path(), &["collect"]);
    assert_eq!(collect.status.code(), Some(exit_codes::OK));
    let summary = stdout(&collect);
    assert!(summary.contains("1/4 wishlists received"));
    assert!(!summary.contains("knitting"));

    let status = santa(temp.path(), &["status"]);
    assert_eq!(status.status.code(), Some(exit_codes::OK));
    let report = stdout(&status);
    assert!(report.contains("WISHLISTS RECEIVED (1/4)"));
    assert!(report.contains("  - Alice\n"));
    assert!(report.contains("Bob <bob@example.com>"));

    let late = santa(temp.path(), &["late", "zed"]);
    assert_eq!(late.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&late.stderr).contains("available: alice, bob, chris, dina"));
}
