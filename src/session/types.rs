//! Session types

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use super::rendezvous::Rendezvous;

/// Session lifetime in seconds. Expiry is detected lazily on access, never by
/// a background sweep.
pub const SESSION_TTL_SECS: i64 = 3600;

/// One two-file comparison session.
///
/// `rendezvous` is non-`None` exactly while the status is [`SessionStatus::Wait`]
/// or [`SessionStatus::Process`]; it is owned by the session and destroyed when
/// the status leaves that range.
pub struct Session {
    pub id: Uuid,

    pub status: SessionStatus,

    /// Creation time, the reference point for TTL expiry
    pub opened_at: DateTime<Utc>,

    /// Where the diff output can be fetched; set only once `Complete`
    pub result_locator: Option<String>,

    pub(crate) rendezvous: Option<Rendezvous>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Open,
            opened_at: Utc::now(),
            result_locator: None,
            rendezvous: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No file yet
    Open,
    /// One file received, awaiting the second
    Wait,
    /// Both files received, diff running
    Process,
    /// Result file available
    Complete,
    /// Diff ran but produced no result
    Failed,
    /// TTL exceeded
    Expired,
}

impl SessionStatus {
    /// Terminal sessions accept no further uploads and are never overwritten
    /// to `Expired`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Expired)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Self::Open => "Session is idle, waiting for 2 files",
            Self::Wait => "Session waiting for second file",
            Self::Process => "Session processing both files",
            Self::Complete => "Result file ready",
            Self::Failed => "Session finished with error",
            Self::Expired => "Session expired",
        };
        f.write_str(phrase)
    }
}
