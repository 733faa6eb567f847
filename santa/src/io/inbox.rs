//! Inbound mail: the [`Inbox`] seam and a Maildir-backed implementation.
//!
//! A Maildir message is unread while it sits in `new/`, or in `cur/` without
//! the `S` (seen) flag. Marking read moves it into `cur/` with `S` added to
//! its `:2,` info suffix, the same thing a mail client does.

use std::fs;
use std::path::{Path, PathBuf};

use mailparse::{MailHeaderMap, ParsedMail, addrparse, parse_mail};
use tracing::{debug, instrument, warn};

use crate::error::TransportError;

/// Opaque reference to one message in an inbox.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageHandle(pub String);

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender and plain-text body of a fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Bare address from the `From` header (no display name).
    pub from_address: String,
    pub body: String,
}

/// Abstraction over mailbox backends.
pub trait Inbox {
    /// Unread messages whose subject contains `subject_contains` (case-insensitive).
    fn search_unread(&self, subject_contains: &str) -> Result<Vec<MessageHandle>, TransportError>;
    fn fetch(&self, handle: &MessageHandle) -> Result<InboundMessage, TransportError>;
    fn mark_read(&self, handle: &MessageHandle) -> Result<(), TransportError>;
}

/// Inbox reading a local Maildir (`new/`, `cur/`, `tmp/`).
#[derive(Debug, Clone)]
pub struct MaildirInbox {
    root: PathBuf,
}

impl MaildirInbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn unread_files(&self) -> Result<Vec<(String, PathBuf)>, TransportError> {
        let mut files = Vec::new();
        for sub in ["new", "cur"] {
            let dir = self.root.join(sub);
            if !dir.is_dir() {
                continue;
            }
            let entries = fs::read_dir(&dir).map_err(|err| {
                TransportError::connection(format!("read {}: {}", dir.display(), err))
            })?;
            for entry in entries {
                let entry = entry.map_err(|err| {
                    TransportError::connection(format!("read {}: {}", dir.display(), err))
                })?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if file_name.starts_with('.') {
                    continue;
                }
                if sub == "cur" && has_seen_flag(&file_name) {
                    continue;
                }
                files.push((format!("{sub}/{file_name}"), entry.path()));
            }
        }
        // Maildir unique names start with the delivery timestamp.
        files.sort_by(|a, b| base_name(&a.0).cmp(base_name(&b.0)));
        Ok(files)
    }

    fn resolve(&self, handle: &MessageHandle) -> Result<PathBuf, TransportError> {
        let relative = Path::new(&handle.0);
        let valid = matches!(
            relative.parent().and_then(Path::to_str),
            Some("new") | Some("cur")
        ) && relative.file_name().is_some();
        if !valid {
            return Err(TransportError::malformed(format!(
                "not a maildir handle: {}",
                handle
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl Inbox for MaildirInbox {
    #[instrument(skip_all, fields(maildir = %self.root.display()))]
    fn search_unread(&self, subject_contains: &str) -> Result<Vec<MessageHandle>, TransportError> {
        if !self.root.is_dir() {
            return Err(TransportError::connection(format!(
                "maildir {} does not exist",
                self.root.display()
            )));
        }
        let needle = subject_contains.to_lowercase();
        let mut handles = Vec::new();
        for (handle, path) in self.unread_files()? {
            let raw = match fs::read(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(path = %path.display(), err = %err, "unreadable message, skipping");
                    continue;
                }
            };
            let subject = match parse_mail(&raw) {
                Ok(parsed) => parsed.headers.get_first_value("Subject").unwrap_or_default(),
                Err(err) => {
                    warn!(path = %path.display(), err = %err, "unparseable message, skipping");
                    continue;
                }
            };
            if subject.to_lowercase().contains(&needle) {
                handles.push(MessageHandle(handle));
            }
        }
        debug!(matched = handles.len(), "maildir search complete");
        Ok(handles)
    }

    fn fetch(&self, handle: &MessageHandle) -> Result<InboundMessage, TransportError> {
        let path = self.resolve(handle)?;
        let raw = fs::read(&path)
            .map_err(|err| TransportError::connection(format!("read {}: {}", path.display(), err)))?;
        parse_inbound(&raw)
    }

    fn mark_read(&self, handle: &MessageHandle) -> Result<(), TransportError> {
        let path = self.resolve(handle)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = self.root.join("cur").join(with_seen_flag(&file_name));
        if target == path {
            return Ok(());
        }
        fs::create_dir_all(self.root.join("cur")).map_err(|err| {
            TransportError::connection(format!("create {}/cur: {}", self.root.display(), err))
        })?;
        fs::rename(&path, &target).map_err(|err| {
            TransportError::connection(format!("mark {} read: {}", path.display(), err))
        })?;
        debug!(from = %path.display(), to = %target.display(), "marked read");
        Ok(())
    }
}

/// Parse a raw RFC 5322 message into sender + body.
///
/// The body is the first `text/plain` part found depth-first, or the top-level
/// body for single-part messages. Undecodable bodies become empty strings.
pub fn parse_inbound(raw: &[u8]) -> Result<InboundMessage, TransportError> {
    let parsed =
        parse_mail(raw).map_err(|err| TransportError::malformed(format!("parse message: {}", err)))?;
    let from = parsed
        .headers
        .get_first_value("From")
        .ok_or_else(|| TransportError::malformed("message has no From header"))?;
    let from_address = bare_address(&from)
        .ok_or_else(|| TransportError::malformed(format!("unparseable From header {:?}", from)))?;
    let body = plain_text_body(&parsed).unwrap_or_default();
    Ok(InboundMessage { from_address, body })
}

fn plain_text_body(mail: &ParsedMail<'_>) -> Option<String> {
    if mail.subparts.is_empty() {
        return Some(mail.get_body().unwrap_or_default());
    }
    first_plain_part(mail)
}

fn first_plain_part(mail: &ParsedMail<'_>) -> Option<String> {
    if mail.subparts.is_empty() {
        if mail.ctype.mimetype == "text/plain" {
            return Some(mail.get_body().unwrap_or_default());
        }
        return None;
    }
    mail.subparts.iter().find_map(first_plain_part)
}

fn bare_address(header: &str) -> Option<String> {
    if let Ok(list) = addrparse(header)
        && let Some(info) = list.extract_single_info()
        && info.addr.contains('@')
    {
        return Some(info.addr.trim().to_string());
    }
    // Fall back to the `Name <addr>` shape for headers the parser rejects.
    let addr = match (header.find('<'), header.rfind('>')) {
        (Some(start), Some(end)) if start < end => &header[start + 1..end],
        _ => header,
    };
    let addr = addr.trim();
    (!addr.is_empty() && addr.contains('@')).then(|| addr.to_string())
}

fn base_name(handle: &str) -> &str {
    let name = handle.rsplit('/').next().unwrap_or(handle);
    name.split(":2,").next().unwrap_or(name)
}

fn has_seen_flag(file_name: &str) -> bool {
    file_name
        .split_once(":2,")
        .is_some_and(|(_, flags)| flags.contains('S'))
}

fn with_seen_flag(file_name: &str) -> String {
    match file_name.split_once(":2,") {
        Some((base, flags)) if flags.contains('S') => format!("{base}:2,{flags}"),
        Some((base, flags)) => {
            let mut flags: Vec<char> = flags.chars().chain(['S']).collect();
            flags.sort_unstable();
            format!("{base}:2,{}", flags.into_iter().collect::<String>())
        }
        None => format!("{file_name}:2,S"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maildir() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        for sub in ["new", "cur", "tmp"] {
            fs::create_dir_all(temp.path().join(sub)).expect("create maildir");
        }
        temp
    }

    fn deliver(root: &Path, sub: &str, name: &str, raw: &str) {
        fs::write(root.join(sub).join(name), raw).expect("deliver");
    }

    const PLAIN: &str = "From: Bob Builder <Bob@Example.com>\r\nSubject: Re: Secret Santa - Send Your Wishlist\r\n\r\nLego, please\r\n";

    const MULTIPART: &str = concat!(
        "From: chris@example.com\r\n",
        "Subject: RE: secret santa\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n",
        "\r\n",
        "--XYZ\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>html candles</p>\r\n",
        "--XYZ\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "plain candles\r\n",
        "--XYZ--\r\n",
    );

    #[test]
    fn search_finds_unread_matching_subjects_in_order() {
        let dir = maildir();
        deliver(dir.path(), "new", "1700000002.b.host", PLAIN);
        deliver(dir.path(), "cur", "1700000001.a.host:2,", MULTIPART);
        deliver(dir.path(), "cur", "1700000000.z.host:2,S", PLAIN);
        deliver(
            dir.path(),
            "new",
            "1700000003.c.host",
            "From: x@example.com\r\nSubject: Lunch?\r\n\r\nhi\r\n",
        );

        let inbox = MaildirInbox::new(dir.path());
        let handles = inbox.search_unread("Secret Santa").expect("search");
        assert_eq!(
            handles,
            vec![
                MessageHandle("cur/1700000001.a.host:2,".to_string()),
                MessageHandle("new/1700000002.b.host".to_string()),
            ]
        );
    }

    #[test]
    fn fetch_extracts_bare_address_and_plain_part() {
        let dir = maildir();
        deliver(dir.path(), "new", "1.plain", PLAIN);
        deliver(dir.path(), "new", "2.multi", MULTIPART);
        let inbox = MaildirInbox::new(dir.path());

        let plain = inbox
            .fetch(&MessageHandle("new/1.plain".to_string()))
            .expect("fetch plain");
        assert_eq!(plain.from_address, "Bob@Example.com");
        assert_eq!(plain.body.trim_end(), "Lego, please");

        let multi = inbox
            .fetch(&MessageHandle("new/2.multi".to_string()))
            .expect("fetch multipart");
        assert_eq!(multi.from_address, "chris@example.com");
        assert_eq!(multi.body.trim_end(), "plain candles");
    }

    #[test]
    fn mark_read_moves_into_cur_with_seen_flag() {
        let dir = maildir();
        deliver(dir.path(), "new", "1.msg", PLAIN);
        deliver(dir.path(), "cur", "2.msg:2,F", PLAIN);
        let inbox = MaildirInbox::new(dir.path());

        inbox
            .mark_read(&MessageHandle("new/1.msg".to_string()))
            .expect("mark new");
        inbox
            .mark_read(&MessageHandle("cur/2.msg:2,F".to_string()))
            .expect("mark cur");

        assert!(dir.path().join("cur/1.msg:2,S").exists());
        assert!(dir.path().join("cur/2.msg:2,FS").exists());
        assert!(inbox.search_unread("santa").expect("search").is_empty());
    }

    #[test]
    fn handles_outside_maildir_are_rejected() {
        let dir = maildir();
        let inbox = MaildirInbox::new(dir.path());
        let err = inbox
            .fetch(&MessageHandle("../etc/passwd".to_string()))
            .expect_err("bad handle");
        assert_eq!(err.kind, crate::error::TransportErrorKind::Malformed);
    }

    #[test]
    fn missing_maildir_is_connection_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inbox = MaildirInbox::new(temp.path().join("nope"));
        assert!(inbox.search_unread("santa").expect_err("missing").is_retryable());
    }

    #[test]
    fn multipart_without_plain_text_yields_empty_body() {
        let raw = concat!(
            "From: dina@example.com\r\n",
            "Content-Type: multipart/mixed; boundary=\"B\"\r\n",
            "\r\n",
            "--B\r\n",
            "Content-Type: image/png\r\n",
            "\r\n",
            "xxxx\r\n",
            "--B--\r\n",
        );
        let message = parse_inbound(raw.as_bytes()).expect("parse");
        assert_eq!(message.body, "");
    }

    #[test]
    fn bare_address_handles_common_shapes() {
        assert_eq!(bare_address("a@b.io").as_deref(), Some("a@b.io"));
        assert_eq!(
            bare_address("\"Doe, Jane\" <jane@x.org>").as_deref(),
            Some("jane@x.org")
        );
        assert_eq!(bare_address("nobody"), None);
    }

    #[test]
    fn seen_flag_helpers() {
        assert!(has_seen_flag("1.x:2,RS"));
        assert!(!has_seen_flag("1.x:2,R"));
        assert_eq!(with_seen_flag("1.x"), "1.x:2,S");
        assert_eq!(with_seen_flag("1.x:2,RF"), "1.x:2,FRS");
    }
}
