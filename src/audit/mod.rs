//! Audit trail of committed credential changes.
//!
//! An [`Event`] describes one change that reached the credential file:
//! what was done, to which user, and how many users the file held
//! afterwards.  Events are only built after `CredentialStore::modify`
//! (or `rotate_key`) has returned `Ok`, so the trail never mentions a
//! change that was rolled back.  Passwords, hashes and salts never go in.
//!
//! With the `audit-log` feature the events are kept in SQLite by
//! [`AuditTrail`].

use std::fmt;

#[cfg(feature = "audit-log")]
mod trail;

#[cfg(feature = "audit-log")]
pub use trail::{AuditTrail, Filter, Recorded};

/// Kinds of credential change worth recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Init,
    AddUser,
    RemoveUser,
    ResetPassword,
    ChangeRole,
    RotateKey,
}

impl Action {
    const ALL: [Action; 6] = [
        Action::Init,
        Action::AddUser,
        Action::RemoveUser,
        Action::ResetPassword,
        Action::ChangeRole,
        Action::RotateKey,
    ];

    /// Stable name stored in the trail.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Init => "init",
            Action::AddUser => "user-add",
            Action::RemoveUser => "user-remove",
            Action::ResetPassword => "passwd",
            Action::ChangeRole => "role",
            Action::RotateKey => "rotate-key",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub action: Action,
    /// The user the change was about, if any.
    pub subject: Option<String>,
    /// Number of users in the credential file after the change.
    pub users_after: usize,
    pub note: Option<String>,
}

impl Event {
    pub fn new(action: Action, subject: Option<&str>, users_after: usize) -> Self {
        Self {
            action,
            subject: subject.map(str::to_string),
            users_after,
            note: None,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("set"), None);
    }

    #[test]
    fn event_builder() {
        let event = Event::new(Action::ChangeRole, Some("alice"), 3)
            .with_note(Some("user -> admin".into()));
        assert_eq!(event.subject.as_deref(), Some("alice"));
        assert_eq!(event.users_after, 3);
        assert_eq!(event.note.as_deref(), Some("user -> admin"));
        assert_eq!(event.action.to_string(), "role");
    }
}
