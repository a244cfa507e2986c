//! SMTP delivery for mailgate.
//!
//! [`transport::build_transport`] turns normalized [`TransportOptions`]
//! into a `lettre` transport; [`deliver`] submits a single message on one.
//! No retries, no queueing: a failure is terminal for the request and is
//! reported back to the dispatcher.

pub mod transport;

pub use transport::build_transport;

use lettre::message::{Mailbox, MultiPart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use mailgate_core::Message;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid transport options: {0}")]
    Transport(String),

    #[error("invalid message: {0}")]
    Message(String),

    #[error("SMTP send failed: {0}")]
    Smtp(String),
}

/// Submit one message on the given transport.
///
/// The message must already have its defaults filled in; `from` and `to`
/// are required by then. Success and the raw provider response are logged
/// here; failures are returned to the caller, which logs and reports them
/// exactly once.
pub async fn deliver(
    mailer: &AsyncSmtpTransport<Tokio1Executor>,
    message: &Message,
) -> Result<(), SendError> {
    let email = build_email(message)?;

    log::info!("Send email: {}", message.canonical_json());

    match mailer.send(email).await {
        Ok(response) => {
            log::info!("sent to {}", message.to.as_deref().unwrap_or_default());
            log::debug!("Response: {:?}", response);
            Ok(())
        }
        Err(err) => Err(SendError::Smtp(diagnostic(&err))),
    }
}

/// Best-available diagnostic text for an error: its display text followed
/// by the source chain.
pub fn diagnostic(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn build_email(message: &Message) -> Result<lettre::Message, SendError> {
    let from = message
        .from
        .as_deref()
        .ok_or_else(|| SendError::Message("missing sender address".into()))?;
    let to = message
        .to
        .as_deref()
        .ok_or_else(|| SendError::Message("missing recipient address".into()))?;

    let mut builder = lettre::Message::builder()
        .from(parse_mailbox(from)?)
        .subject(message.subject.as_deref().unwrap_or_default());

    for mailbox in parse_mailboxes(to)? {
        builder = builder.to(mailbox);
    }
    if let Some(cc) = message.cc.as_deref() {
        for mailbox in parse_mailboxes(cc)? {
            builder = builder.cc(mailbox);
        }
    }
    if let Some(bcc) = message.bcc.as_deref() {
        for mailbox in parse_mailboxes(bcc)? {
            builder = builder.bcc(mailbox);
        }
    }

    let text = message.text.clone().unwrap_or_default();
    let email = match message.html() {
        Some(html) => {
            builder.multipart(MultiPart::alternative_plain_html(text, html.to_string()))
        }
        None => builder.body(text),
    };

    email.map_err(|err| SendError::Message(err.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .trim()
        .parse()
        .map_err(|err| SendError::Message(format!("invalid address '{address}': {err}")))
}

/// Comma-separated recipient lists are accepted anywhere an address is.
fn parse_mailboxes(list: &str) -> Result<Vec<Mailbox>, SendError> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_mailbox)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> Message {
        Message::coerce(value).unwrap()
    }

    #[test]
    fn build_email_happy_path() {
        let email = build_email(&message(json!({
            "from": "d@d.com",
            "to": "e@e.com",
            "subject": "Default",
            "text": "hi",
        })));
        assert!(email.is_ok());
    }

    #[test]
    fn build_email_requires_from_and_to() {
        let err = build_email(&message(json!({"to": "e@e.com", "text": "hi"}))).unwrap_err();
        assert!(matches!(err, SendError::Message(_)));

        let err = build_email(&message(json!({"from": "d@d.com", "text": "hi"}))).unwrap_err();
        assert!(matches!(err, SendError::Message(_)));
    }

    #[test]
    fn build_email_rejects_bad_address() {
        let err =
            build_email(&message(json!({"from": "not an address", "to": "e@e.com"})))
                .unwrap_err();
        assert!(matches!(err, SendError::Message(_)));
    }

    #[test]
    fn recipient_lists_are_split_on_commas() {
        let mailboxes = parse_mailboxes("a@b.com, Named <c@d.com>,e@f.com").unwrap();
        assert_eq!(mailboxes.len(), 3);
        assert_eq!(mailboxes[1].email.to_string(), "c@d.com");
    }

    #[test]
    fn html_message_builds_alternative_body() {
        let email = build_email(&message(json!({
            "from": "d@d.com",
            "to": "e@e.com",
            "text": "hi",
            "html": "<b>hi</b>",
        })));
        assert!(email.is_ok());
    }

    #[test]
    fn diagnostic_joins_source_chain() {
        use std::fmt;

        #[derive(Debug)]
        struct Outer(Inner);
        #[derive(Debug)]
        struct Inner;

        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "outer failed")
            }
        }
        impl fmt::Display for Inner {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "connection refused")
            }
        }
        impl std::error::Error for Inner {}
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        assert_eq!(diagnostic(&Outer(Inner)), "outer failed: connection refused");
    }
}
