//! Session lifecycle for Tether.
//!
//! This crate holds the decision-making half of the bot's connection
//! handling:
//!
//! 1. **Lifecycle**: which state the bot is in and what happens after a
//!    session ends ([`Lifecycle`])
//! 2. **Backoff**: how long to wait before reconnecting ([`BackoffPolicy`])
//! 3. **Identity rotation**: which username to log in under after a
//!    duplicate-login conflict ([`IdentityRotator`])
//! 4. **Authentication**: the `/register` + `/login` chat exchange
//!    ([`AuthNegotiator`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller (tether)  ← performs the I/O, asks this crate what to do next
//!     ↕
//! Session Layer (this crate)  ← states, delays, identities, auth replies
//!     ↕
//! Transport Layer (below)  ← Connection, EventStream, TransportEvent
//! ```

mod auth;
mod backoff;
mod error;
mod identity;
mod lifecycle;
mod session;
mod wait;

pub use auth::{
    AnySender, AuthNegotiator, LoginReply, RegisterReply, ReplyMatcher, SystemSenders,
    classify_login, classify_register,
};
pub use backoff::{BackoffPolicy, is_throttled};
pub use error::{AuthError, SessionError, WaitError};
pub use identity::{Identity, IdentityRotator, is_identity_conflict};
pub use lifecycle::{EndOutcome, Lifecycle, SpawnGate};
pub use session::{ReconnectState, Session, SessionEnd, SessionState};
pub use wait::{discard_pending, wait_for_event};
