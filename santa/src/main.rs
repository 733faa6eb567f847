//! `santa` command-line entry point.
//!
//! Loads `santa.toml`, wires the real transports (sendmail, Maildir, JSON
//! state file) into the orchestration modules and prints their outcomes.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use santa::collect::{CollectEvent, CollectOptions, collect_wishlists};
use santa::core::gate::{DispatchMode, Letter};
use santa::core::report::status_report;
use santa::dispatch::{DispatchEvent, DispatchOptions, SenderIdentity, dispatch_assignments};
use santa::exit_codes;
use santa::io::config::{SantaConfig, load_config, write_config};
use santa::io::inbox::MaildirInbox;
use santa::io::mailer::SendmailMailer;
use santa::io::paths::SantaPaths;
use santa::io::state_store::{GameStore, JsonFileStore};
use santa::io::templates::Templates;
use santa::late::send_late_wishlist;
use santa::logging;
use santa::setup::{InviteEvent, SetupOptions, setup_game};
use santa::status::{render_summary, status_from_store};

#[derive(Parser)]
#[command(
    name = "santa",
    version,
    about = "Secret Santa organizer: match, collect wishlists, send assignments"
)]
struct Cli {
    /// Path to the game configuration.
    #[arg(long, global = true, default_value = "santa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter `santa.toml` if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Match participants, save the game and email wishlist requests.
    Setup {
        /// Show the matching without saving or sending anything.
        #[arg(long)]
        dry_run: bool,
        /// Replace an existing game.
        #[arg(short, long)]
        force: bool,
    },
    /// Show who has and hasn't sent a wishlist.
    Status,
    /// Record wishlists from unread replies in the inbox.
    Collect {
        #[arg(long)]
        dry_run: bool,
    },
    /// Email assignments to every giver the wishlist gate allows.
    Send {
        #[arg(long)]
        dry_run: bool,
        /// Send to every unsent giver, with a notice where the wishlist is missing.
        #[arg(short, long)]
        force: bool,
    },
    /// Forward one participant's late wishlist to their Secret Santa.
    Late {
        /// Participant whose wishlist arrived late (case-insensitive).
        name: String,
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = cli.config.as_path();
    match cli.command {
        Command::Init { force } => cmd_init(config, force),
        Command::Setup { dry_run, force } => App::load(config)?.setup(dry_run, force),
        Command::Status => App::load(config)?.status(),
        Command::Collect { dry_run } => App::load(config)?.collect(dry_run),
        Command::Send { dry_run, force } => App::load(config)?.send(dry_run, force),
        Command::Late { name, dry_run } => App::load(config)?.late(&name, dry_run),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &SantaConfig::starter())?;
    println!("Wrote {}", config_path.display());
    println!("Edit the participants and [mail] section, then run `santa setup`.");
    Ok(exit_codes::OK)
}

/// Real transports wired to the loaded config.
struct App {
    cfg: SantaConfig,
    paths: SantaPaths,
    store: JsonFileStore,
    templates: Templates,
    sender: SenderIdentity,
}

impl App {
    fn load(config_path: &Path) -> Result<Self> {
        let cfg = load_config(config_path)?;
        let paths = SantaPaths::new(config_path, &cfg);
        Ok(Self {
            store: JsonFileStore::new(&paths.state_path),
            templates: Templates::from_config(&cfg.mail),
            sender: SenderIdentity::from_config(&cfg.mail),
            paths,
            cfg,
        })
    }

    fn mailer(&self) -> SendmailMailer {
        SendmailMailer::from_config(&self.cfg.mail)
    }

    fn setup(&self, dry_run: bool, force: bool) -> Result<i32> {
        let roster = self.cfg.roster()?;
        let blocked = self.cfg.blocked(&roster)?;
        let outcome = setup_game(
            &self.store,
            &self.mailer(),
            &self.templates,
            &self.sender,
            &roster,
            &blocked,
            &mut rand::thread_rng(),
            SetupOptions {
                dry_run,
                force,
                max_attempts: self.cfg.max_match_attempts,
            },
        )?;

        if outcome.dry_run {
            println!("DRY RUN: nothing saved, nothing sent.\n");
            for pair in outcome.pairs() {
                println!(
                    "  {} → {}",
                    pair.giver.display_name(),
                    pair.receiver.display_name()
                );
            }
            return Ok(exit_codes::OK);
        }

        println!(
            "Game saved to {} with {} participants.",
            self.paths.state_path.display(),
            outcome.state.participants.len()
        );
        for event in &outcome.invites {
            match event {
                InviteEvent::Invited { name, email } => {
                    println!("  ✉️  wishlist request sent to {} <{}>", name.display_name(), email);
                }
                InviteEvent::Failed { name, error } => {
                    eprintln!("  ❌ {}: {}", name.display_name(), error);
                }
            }
        }
        Ok(partial_if(outcome.failures()))
    }

    fn status(&self) -> Result<i32> {
        let (_, text) = status_from_store(&self.store)?;
        print!("{}", text);
        Ok(exit_codes::OK)
    }

    fn collect(&self, dry_run: bool) -> Result<i32> {
        let state = self.store.load()?;
        let inbox = MaildirInbox::new(&self.paths.maildir);
        let outcome = collect_wishlists(
            &self.store,
            &inbox,
            state,
            &CollectOptions {
                subject_filter: self.cfg.subject_filter.clone(),
                dry_run,
            },
        )?;

        for event in &outcome.events {
            match event {
                CollectEvent::NewWishlist {
                    name,
                    email,
                    preview,
                } if dry_run => {
                    println!("  would record {} <{}>: {}", name.display_name(), email, preview);
                }
                CollectEvent::AlreadyReceived { name } if dry_run => {
                    println!("  {} already sent a wishlist; ignoring", name.display_name());
                }
                CollectEvent::UnknownSender { address } => {
                    println!("  skipping message from unknown sender {}", address);
                }
                CollectEvent::FetchFailed { handle, error }
                | CollectEvent::MarkReadFailed { handle, error } => {
                    eprintln!("  ❌ {}: {}", handle, error);
                }
                _ => {}
            }
        }

        if dry_run {
            println!(
                "DRY RUN: {} new wishlist(s) among {} matching message(s); nothing saved.",
                outcome.new_wishlists(),
                outcome.matched
            );
        } else {
            let report = status_report(&outcome.state.participants);
            println!("{}", render_summary(&report));
        }
        Ok(partial_if(outcome.transport_failures()))
    }

    fn send(&self, dry_run: bool, force: bool) -> Result<i32> {
        let state = self.store.load()?;
        let mode = if force {
            DispatchMode::Forced
        } else {
            DispatchMode::Gated
        };
        if mode == DispatchMode::Gated {
            let report = status_report(&state.participants);
            if !report.all_received() {
                println!(
                    "⚠️  Only {}/{} wishlists received; givers still waiting on a wishlist are skipped.",
                    report.received.len(),
                    report.total()
                );
            }
        }

        let outcome = dispatch_assignments(
            &self.store,
            &self.mailer(),
            &self.templates,
            &self.sender,
            state,
            DispatchOptions { mode, dry_run },
        )?;

        for event in &outcome.events {
            match event {
                DispatchEvent::Sent { giver, email, .. } => {
                    println!("  ✉️  assignment sent to {} <{}>", giver.display_name(), email);
                }
                DispatchEvent::WouldSend { giver, mail, letter } => {
                    let note = match letter {
                        Letter::WithWishlist => "with wishlist",
                        Letter::MissingWishlist => "wishlist missing",
                    };
                    println!(
                        "  would send to {} <{}> ({})",
                        giver.display_name(),
                        mail.to,
                        note
                    );
                }
                DispatchEvent::Skipped { giver, reason } => {
                    println!("  skipping {}: {}", giver.display_name(), reason);
                }
                DispatchEvent::Failed { giver, error } => {
                    eprintln!("  ❌ {}: {}", giver.display_name(), error);
                }
            }
        }

        if dry_run {
            println!("DRY RUN: {} assignment(s) would be sent.", outcome.would_send());
        } else {
            println!("{} assignment(s) sent.", outcome.sent());
        }
        Ok(partial_if(outcome.failures()))
    }

    fn late(&self, name: &str, dry_run: bool) -> Result<i32> {
        let state = self.store.load()?;
        let outcome = send_late_wishlist(
            &self.mailer(),
            &self.templates,
            &self.sender,
            &state,
            name,
            dry_run,
        )?;
        let receiver = outcome.receiver.display_name();
        match outcome.preview {
            Some(mail) => {
                println!("DRY RUN: would forward {}'s wishlist.\n", receiver);
                println!("Subject: {}\n\n{}", mail.subject, mail.body);
            }
            None => println!("Forwarded {}'s wishlist to their Secret Santa.", receiver),
        }
        Ok(exit_codes::OK)
    }
}

fn partial_if(failures: usize) -> i32 {
    if failures == 0 {
        exit_codes::OK
    } else {
        eprintln!("{} mail operation(s) failed; re-run later to retry.", failures);
        exit_codes::PARTIAL
    }
}
