//! Shared types for the dossier workspace.
//!
//! Holds the participant [`Role`], the canonical timestamp encoding used by
//! every table, and the [`ActorDirectory`] seam through which timeline views
//! resolve display names. Crates that need any of these depend on
//! `dossier-types` and nothing else in the workspace, which keeps the
//! dependency graph acyclic.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The side of a brokerage relationship a participant acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// The broker handling the transaction.
    Broker,
    /// The broker's client.
    Client,
}

impl Role {
    /// Returns the canonical string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broker => "BROKER",
            Self::Client => "CLIENT",
        }
    }

    /// Returns the other party.
    pub fn counterparty(self) -> Self {
        match self {
            Self::Broker => Self::Client,
            Self::Client => Self::Broker,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BROKER" => Ok(Self::Broker),
            "CLIENT" => Ok(Self::Client),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

/// Timestamp encoding shared by every persisted record.
///
/// Timestamps are stored as fixed-width RFC 3339 UTC strings with
/// microsecond precision (`2024-05-01T09:30:00.000000Z`), so comparing the
/// stored text lexically gives the same answer as comparing the instants.
pub mod timestamp {
    use super::*;

    /// Formats an instant in the canonical storage encoding.
    pub fn format(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parses a stored timestamp back into an instant.
    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
    }

    /// The current instant in the canonical storage encoding.
    pub fn now() -> String {
        format(Utc::now())
    }

    /// The current instant at storage precision, so values built in memory
    /// compare equal to the same values read back.
    pub fn stored_now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Resolves actor identifiers to human-readable names.
///
/// Lookups are best-effort: an implementation that cannot answer returns
/// `None` and the caller renders the entry without a name.
pub trait ActorDirectory: Send + Sync {
    /// Returns the display name for `actor_id`, if known.
    fn display_name(&self, actor_id: &str) -> Option<String>;
}

/// A directory that knows nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl ActorDirectory for NoDirectory {
    fn display_name(&self, _actor_id: &str) -> Option<String> {
        None
    }
}

impl ActorDirectory for HashMap<String, String> {
    fn display_name(&self, actor_id: &str) -> Option<String> {
        self.get(actor_id).cloned()
    }
}
