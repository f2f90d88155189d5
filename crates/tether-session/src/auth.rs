//! Chat-command authentication.
//!
//! Offline-mode servers commonly run a login plugin that expects the player
//! to type `/register <pw> <pw>` on first join and `/login <pw>` every time.
//! The plugin answers in chat. [`AuthNegotiator`] drives that exchange:
//!
//! ```text
//!   send /register pw pw ──→ wait for reply ──→ classify
//!        (registered / already registered)        │
//!   send /login pw ──────→ wait for reply ──→ classify ──→ Ok / Err
//! ```
//!
//! Every wait is bounded by a deadline, and a kick or disconnect during a
//! wait aborts the negotiation immediately.
//!
//! # Which chat line is "the reply"?
//!
//! Chat is shared with other players, so the first line after a command is
//! not necessarily the plugin's answer. A [`ReplyMatcher`] decides which
//! lines count. [`AnySender`] accepts the first line from anyone;
//! [`SystemSenders`] only accepts lines attributed to known server senders.

use std::time::Duration;

use tether_transport::{Connection, EventStream, TransportEvent};
use tokio::time::Instant;

use crate::{AuthError, discard_pending, wait_for_event};

/// Decides whether a chat line is a reply to our auth commands.
pub trait ReplyMatcher: Send + Sync + 'static {
    fn matches(&self, sender: &str, text: &str) -> bool;
}

/// Accepts the first chat line, whoever sent it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySender;

impl ReplyMatcher for AnySender {
    fn matches(&self, _sender: &str, _text: &str) -> bool {
        true
    }
}

/// Accepts only lines attributed to one of the given senders
/// (case-insensitive).
#[derive(Debug, Clone)]
pub struct SystemSenders {
    names: Vec<String>,
}

impl SystemSenders {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl ReplyMatcher for SystemSenders {
    fn matches(&self, sender: &str, _text: &str) -> bool {
        let sender = sender.to_ascii_lowercase();
        self.names.iter().any(|n| *n == sender)
    }
}

/// How the server answered `/register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterReply {
    /// Freshly registered, or the account already existed. Either way,
    /// go on to log in.
    Proceed,
    Rejected,
    Unrecognized,
}

/// How the server answered `/login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReply {
    LoggedIn,
    Rejected,
    Unrecognized,
}

pub fn classify_register(reply: &str) -> RegisterReply {
    if reply.contains("successfully registered") || reply.contains("already registered") {
        RegisterReply::Proceed
    } else if reply.contains("Invalid command") {
        RegisterReply::Rejected
    } else {
        RegisterReply::Unrecognized
    }
}

pub fn classify_login(reply: &str) -> LoginReply {
    if reply.contains("successfully logged in") {
        LoginReply::LoggedIn
    } else if reply.contains("Invalid password") || reply.contains("not registered") {
        LoginReply::Rejected
    } else {
        LoginReply::Unrecognized
    }
}

/// Runs the register-then-login exchange on a fresh connection.
pub struct AuthNegotiator {
    matcher: Box<dyn ReplyMatcher>,
    reply_timeout: Duration,
}

impl AuthNegotiator {
    /// A negotiator that treats the first chat line as the reply.
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            matcher: Box::new(AnySender),
            reply_timeout,
        }
    }

    /// Replaces the reply matcher.
    pub fn with_matcher(mut self, matcher: impl ReplyMatcher) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Registers (if needed) and logs in.
    ///
    /// Only chat received after a command is sent can answer it: anything
    /// already queued is dropped first. Consumes events from `events` while
    /// waiting. Chat lines the matcher
    /// rejects and non-terminal events are skipped; a terminal event is
    /// returned inside [`AuthError::Interrupted`] so the caller can still
    /// act on it.
    pub async fn negotiate<C: Connection>(
        &self,
        conn: &C,
        events: &mut EventStream,
        password: &str,
    ) -> Result<(), AuthError> {
        discard_pending(events)?;
        conn.send_chat(&format!("/register {password} {password}"))?;
        tracing::debug!(conn = %conn.id(), "sent register command");

        let reply = self.wait_for_reply(events).await?;
        match classify_register(&reply) {
            RegisterReply::Proceed => {
                tracing::info!(conn = %conn.id(), %reply, "registration accepted");
            }
            RegisterReply::Rejected => return Err(AuthError::RegistrationRejected(reply)),
            RegisterReply::Unrecognized => return Err(AuthError::UnexpectedReply(reply)),
        }

        discard_pending(events)?;
        conn.send_chat(&format!("/login {password}"))?;
        tracing::debug!(conn = %conn.id(), "sent login command");

        let reply = self.wait_for_reply(events).await?;
        match classify_login(&reply) {
            LoginReply::LoggedIn => {
                tracing::info!(conn = %conn.id(), "logged in");
                Ok(())
            }
            LoginReply::Rejected => Err(AuthError::LoginRejected(reply)),
            LoginReply::Unrecognized => Err(AuthError::UnexpectedReply(reply)),
        }
    }

    async fn wait_for_reply(&self, events: &mut EventStream) -> Result<String, AuthError> {
        let deadline = Instant::now() + self.reply_timeout;
        let reply = wait_for_event(events, deadline, |event| match event {
            TransportEvent::Chat { sender, text } if self.matcher.matches(sender, text) => {
                Some(text.clone())
            }
            _ => None,
        })
        .await?;
        Ok(reply)
    }
}
