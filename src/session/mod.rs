//! Session lifecycle: registry, state machine, and the upload rendezvous
//!
//! A session pairs exactly two uploads and one diff result. The registry holds
//! all sessions behind one lock; the rendezvous carries the first upload's
//! stream across request tasks to wherever the diff actually runs.

pub mod registry;
pub mod rendezvous;
pub mod types;

pub use registry::{SessionRegistry, UploadSlot};
pub use rendezvous::{upload_channel, Rendezvous, UploadStream, WaitHandle};
pub use types::{Session, SessionStatus, SESSION_TTL_SECS};
