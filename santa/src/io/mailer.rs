//! Outbound mail.
//!
//! The [`Mailer`] trait decouples orchestration from the delivery mechanism.
//! [`SendmailMailer`] hands a rendered RFC 5322 message to a local
//! sendmail-compatible command; tests use a scripted mailer that records
//! messages instead.

use std::process::Command;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::{TransportError, TransportErrorKind};
use crate::io::config::MailConfig;
use crate::io::process::run_command_with_timeout;

const STDERR_LIMIT_BYTES: usize = 16 * 1024;

/// sysexits `EX_NOPERM`: sendmail relays exit with it when the smarthost
/// refuses our credentials.
const EX_NOPERM: i32 = 77;

/// A single outgoing plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub from_display_name: String,
    pub reply_to: Option<String>,
}

/// Abstraction over mail delivery backends.
pub trait Mailer {
    /// Deliver one message. `Ok` means the transport accepted it.
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

/// Mailer that pipes messages to `sendmail -t -i` (or any compatible command).
pub struct SendmailMailer {
    command: Vec<String>,
    from_address: String,
    timeout: Duration,
}

impl SendmailMailer {
    pub fn new(command: Vec<String>, from_address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command,
            from_address: from_address.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &MailConfig) -> Self {
        Self::new(
            cfg.send_command.clone(),
            cfg.from_address.clone(),
            cfg.timeout(),
        )
    }
}

impl Mailer for SendmailMailer {
    #[instrument(skip_all, fields(to = %mail.to, timeout_secs = self.timeout.as_secs()))]
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| TransportError::connection("mail send command is empty"))?;
        let message = render_message(&self.from_address, mail);

        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_command_with_timeout(
            cmd,
            Some(message.as_bytes()),
            self.timeout,
            STDERR_LIMIT_BYTES,
        )
        .map_err(|err| TransportError::connection(format!("{program}: {err:#}")))?;

        if output.timed_out {
            warn!("mail command timed out");
            return Err(TransportError::timeout(format!(
                "{program} did not finish within {:?}",
                self.timeout
            )));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "mail command failed");
            let kind = match output.status.code() {
                Some(EX_NOPERM) => TransportErrorKind::Auth,
                _ => TransportErrorKind::Rejected,
            };
            return Err(TransportError::new(
                kind,
                format!(
                    "{program} exited with {:?}: {}",
                    output.status.code(),
                    output.stderr_text()
                ),
            ));
        }

        info!("mail handed to transport");
        Ok(())
    }
}

/// Render headers + body as an RFC 5322 message with CRLF line endings.
pub fn render_message(from_address: &str, mail: &OutgoingMail) -> String {
    let mut headers = vec![
        format!(
            "From: {} <{}>",
            encode_phrase(&mail.from_display_name),
            from_address
        ),
        format!("To: {}", mail.to),
        format!("Subject: {}", encode_text(&mail.subject)),
        format!("Date: {}", Utc::now().to_rfc2822()),
    ];
    if let Some(reply_to) = &mail.reply_to {
        headers.push(format!("Reply-To: {}", reply_to));
    }
    headers.push("MIME-Version: 1.0".to_string());
    headers.push("Content-Type: text/plain; charset=utf-8".to_string());
    headers.push("Content-Transfer-Encoding: 8bit".to_string());

    let body = mail.body.replace("\r\n", "\n").replace('\n', "\r\n");
    debug!(bytes = body.len(), "rendered message");
    format!("{}\r\n\r\n{}\r\n", headers.join("\r\n"), body)
}

/// Display name for an address header: quoted when it has specials, encoded when non-ASCII.
fn encode_phrase(phrase: &str) -> String {
    if !phrase.is_ascii() {
        return encode_word(phrase);
    }
    if phrase
        .chars()
        .any(|c| "()<>[]:;@\\,.\"'".contains(c))
    {
        format!("\"{}\"", phrase.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        phrase.to_string()
    }
}

fn encode_text(text: &str) -> String {
    if text.is_ascii() {
        text.to_string()
    } else {
        encode_word(text)
    }
}

/// RFC 2047 "Q" encoded-word.
fn encode_word(text: &str) -> String {
    let mut encoded = String::from("=?utf-8?q?");
    for byte in text.bytes() {
        match byte {
            b' ' => encoded.push('_'),
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("={:02X}", byte)),
        }
    }
    encoded.push_str("?=");
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: "bob@example.com".to_string(),
            subject: "Your Secret Santa Assignment: Chris!".to_string(),
            body: "line one\nline two".to_string(),
            from_display_name: "Santa's Workshop".to_string(),
            reply_to: Some("helper@example.com".to_string()),
        }
    }

    #[test]
    fn renders_headers_and_crlf_body() {
        let message = render_message("santa@example.com", &mail());
        assert!(message.starts_with("From: \"Santa's Workshop\" <santa@example.com>\r\n"));
        assert!(message.contains("\r\nTo: bob@example.com\r\n"));
        assert!(message.contains("\r\nSubject: Your Secret Santa Assignment: Chris!\r\n"));
        assert!(message.contains("\r\nReply-To: helper@example.com\r\n"));
        assert!(message.ends_with("\r\n\r\nline one\r\nline two\r\n"));
    }

    #[test]
    fn encodes_non_ascii_subject() {
        let mut m = mail();
        m.subject = "Ho ho 🎅".to_string();
        m.reply_to = None;
        let message = render_message("santa@example.com", &m);
        assert!(message.contains("Subject: =?utf-8?q?Ho_ho_=F0=9F=8E=85?=\r\n"));
        assert!(!message.contains("Reply-To"));
    }

    #[test]
    fn sendmail_mailer_pipes_message_to_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sink = temp.path().join("sent.eml");
        let mailer = SendmailMailer::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("cat > {}", sink.display()),
            ],
            "santa@example.com",
            Duration::from_secs(5),
        );
        mailer.send(&mail()).expect("send");
        let written = std::fs::read_to_string(&sink).expect("read sink");
        assert!(written.contains("To: bob@example.com"));
        assert!(written.contains("line two"));
    }

    #[test]
    fn failing_command_is_rejected() {
        let mailer = SendmailMailer::new(
            vec!["sh".to_string(), "-c".to_string(), "echo nope >&2; exit 75".to_string()],
            "santa@example.com",
            Duration::from_secs(5),
        );
        let err = mailer.send(&mail()).expect_err("rejected");
        assert_eq!(err.kind, TransportErrorKind::Rejected);
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn permission_exit_is_an_auth_failure() {
        let mailer = SendmailMailer::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat > /dev/null; echo '535 authentication failed' >&2; exit 77".to_string(),
            ],
            "santa@example.com",
            Duration::from_secs(5),
        );
        let err = mailer.send(&mail()).expect_err("auth");
        assert_eq!(err.kind, TransportErrorKind::Auth);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("(authentication)"));
        assert!(err.message.contains("535"));
    }

    #[test]
    fn missing_command_is_connection_error() {
        let mailer = SendmailMailer::new(
            vec!["/nonexistent/sendmail".to_string()],
            "santa@example.com",
            Duration::from_secs(5),
        );
        let err = mailer.send(&mail()).expect_err("spawn fails");
        assert!(err.is_retryable());
    }

    #[test]
    fn slow_command_times_out() {
        let mailer = SendmailMailer::new(
            vec!["sh".to_string(), "-c".to_string(), "exec sleep 5".to_string()],
            "santa@example.com",
            Duration::from_millis(100),
        );
        let err = mailer.send(&mail()).expect_err("timeout");
        assert_eq!(err.kind, crate::error::TransportErrorKind::Timeout);
    }
}
