//! Username rotation.
//!
//! Servers refuse a second login under a name that is still logged in.
//! When that happens the bot moves to the next name in its sequence:
//! `Bot`, `Bot1`, `Bot2`, and so on. Names are never handed out twice.

use std::fmt;

/// A username the bot logs in under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    base: String,
    suffix: u32,
}

impl Identity {
    /// The unsuffixed base identity.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            suffix: 0,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `0` for the base name.
    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    /// The username sent to the server.
    pub fn username(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suffix == 0 {
            f.write_str(&self.base)
        } else {
            write!(f, "{}{}", self.base, self.suffix)
        }
    }
}

/// Hands out identities in a strictly increasing sequence.
#[derive(Debug, Clone)]
pub struct IdentityRotator {
    base: String,
    counter: u32,
}

impl IdentityRotator {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            counter: 0,
        }
    }

    /// The identity most recently handed out (the base before any rotation).
    pub fn current(&self) -> Identity {
        Identity {
            base: self.base.clone(),
            suffix: self.counter,
        }
    }

    /// Advances to the next identity and returns it.
    pub fn next(&mut self) -> Identity {
        self.counter = self.counter.saturating_add(1);
        self.current()
    }
}

/// Whether a kick or end reason means our name is already logged in.
pub fn is_identity_conflict(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    reason.contains("duplicate_login") || reason.contains("logged in from another location")
}
