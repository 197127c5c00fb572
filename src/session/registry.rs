//! Session registry
//!
//! In-memory session store with lazy TTL expiry. Every state transition runs
//! under the registry's write lock, which makes [`SessionRegistry::claim_upload`]
//! the atomic compare-and-set that decides first-vs-second arrival: two racing
//! uploads against the same session always resolve to exactly one `Open → Wait`
//! and one `Wait → Process` transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::session::rendezvous::{Rendezvous, UploadStream, WaitHandle};
use crate::session::types::{Session, SessionStatus, SESSION_TTL_SECS};

/// Process-scoped session registry
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl_secs: i64,
}

/// Which side of the pairing an upload call landed on.
pub enum UploadSlot {
    /// First file in: hold the request open until the partner registers.
    First(WaitHandle),
    /// Second file in: the caller owns the first stream and runs the diff.
    Second(UploadStream),
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL_SECS)
    }

    /// Create a registry with a custom TTL
    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                ttl_secs,
            }),
        }
    }

    /// Open a new session
    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.inner.sessions.write().await.insert(id, session);

        tracing::info!(session_id = %id.simple(), "opened session");
        id
    }

    /// Status and result locator snapshot, with lazy expiry applied.
    pub async fn peek(&self, id: Uuid) -> Result<(SessionStatus, Option<String>), AppError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = Self::live(&mut sessions, id, self.inner.ttl_secs)?;
        Ok((session.status, session.result_locator.clone()))
    }

    /// Remove a session. Absent sessions are an error; expired ones answer
    /// Gone, the same as every other access.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut sessions = self.inner.sessions.write().await;
        Self::live(&mut sessions, id, self.inner.ttl_secs)?;
        sessions.remove(&id);

        tracing::info!(session_id = %id.simple(), "dropped session");
        Ok(())
    }

    /// Claim an upload slot for this session.
    ///
    /// `first` is the caller's own stream handle; it is only kept if the
    /// caller turns out to be the first party. For the second party the
    /// stored rendezvous is consumed, its ready signal fires, and the first
    /// party's stream is handed back to the caller.
    pub async fn claim_upload(
        &self,
        id: Uuid,
        first: UploadStream,
    ) -> Result<UploadSlot, AppError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = Self::live(&mut sessions, id, self.inner.ttl_secs)?;

        match session.status {
            SessionStatus::Open => {
                let (rendezvous, handle) = Rendezvous::begin(first);
                session.rendezvous = Some(rendezvous);
                session.status = SessionStatus::Wait;

                tracing::info!(
                    session_id = %id.simple(),
                    "first file registered, waiting for partner"
                );
                Ok(UploadSlot::First(handle))
            }
            SessionStatus::Wait => {
                let rendezvous = session.rendezvous.take().ok_or_else(|| {
                    AppError::Internal("waiting session has no rendezvous".to_string())
                })?;
                session.status = SessionStatus::Process;
                let partner = rendezvous.complete();

                tracing::info!(
                    session_id = %id.simple(),
                    first = %partner.file_name,
                    "second file registered, starting diff"
                );
                Ok(UploadSlot::Second(partner))
            }
            SessionStatus::Process | SessionStatus::Complete | SessionStatus::Failed => {
                Err(AppError::Conflict(session.status.to_string()))
            }
            // live() already rejected expired sessions
            SessionStatus::Expired => Err(AppError::Gone(id.simple().to_string())),
        }
    }

    /// Record the engine outcome: a locator completes the session, none fails
    /// it. Only valid while the session is mid-diff.
    pub async fn finish(
        &self,
        id: Uuid,
        locator: Option<String>,
    ) -> Result<SessionStatus, AppError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(id.simple().to_string()))?;

        if session.status != SessionStatus::Process {
            return Err(AppError::Conflict(session.status.to_string()));
        }

        match locator {
            Some(locator) => {
                session.status = SessionStatus::Complete;
                session.result_locator = Some(locator);
            }
            None => session.status = SessionStatus::Failed,
        }
        Ok(session.status)
    }

    /// Look up a session and apply lazy expiry.
    ///
    /// Terminal `Complete`/`Failed` sessions are never overwritten to
    /// `Expired`. Expiring a waiting session drops its rendezvous, which
    /// wakes a blocked first uploader with an error.
    fn live<'a>(
        sessions: &'a mut HashMap<Uuid, Session>,
        id: Uuid,
        ttl_secs: i64,
    ) -> Result<&'a mut Session, AppError> {
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(id.simple().to_string()))?;

        match session.status {
            SessionStatus::Expired => return Err(AppError::Gone(id.simple().to_string())),
            SessionStatus::Complete | SessionStatus::Failed => {}
            _ => {
                let age = (Utc::now() - session.opened_at).num_seconds();
                if age > ttl_secs {
                    session.status = SessionStatus::Expired;
                    session.rendezvous = None;

                    tracing::debug!(session_id = %id.simple(), age_secs = age, "session expired");
                    return Err(AppError::Gone(id.simple().to_string()));
                }
            }
        }

        Ok(session)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
