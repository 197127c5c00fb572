//! Upload rendezvous
//!
//! Single-use pairing state for one session: the first upload parks its byte
//! stream and a single-fire ready signal here; the second upload takes the
//! stream, fires the signal, and runs the diff itself. The oneshot's move
//! semantics guarantee the signal cannot fire twice, and taking the rendezvous
//! out of the session guarantees at most one engine invocation per pairing.

use bytes::Bytes;
use std::io;
use tokio::sync::{mpsc, oneshot};

/// Depth of the chunk channel between the first uploader and the engine.
/// Bounds memory while one side outpaces the other.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// One uploaded file as the engine sees it: a display name plus a bounded
/// stream of body chunks.
pub struct UploadStream {
    pub file_name: String,
    pub chunks: mpsc::Receiver<io::Result<Bytes>>,
}

/// Create the chunk channel for an upload. The sender side stays with the
/// request task feeding body bytes; the receiver side travels through the
/// rendezvous to whichever task runs the engine.
pub fn upload_channel(file_name: String) -> (mpsc::Sender<io::Result<Bytes>>, UploadStream) {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    (
        tx,
        UploadStream {
            file_name,
            chunks: rx,
        },
    )
}

pub struct Rendezvous {
    first: UploadStream,
    ready: oneshot::Sender<()>,
}

impl Rendezvous {
    /// Record the first upload's stream; returns the handle its caller waits on.
    pub fn begin(first: UploadStream) -> (Self, WaitHandle) {
        let (ready_tx, ready_rx) = oneshot::channel();
        (
            Self {
                first,
                ready: ready_tx,
            },
            WaitHandle { ready: ready_rx },
        )
    }

    /// Release the first caller and hand its stream to the second.
    ///
    /// The send result is ignored: a first caller that already timed out has
    /// dropped its handle, and the pairing proceeds without it.
    pub fn complete(self) -> UploadStream {
        let _ = self.ready.send(());
        self.first
    }
}

/// Completes once the second upload has registered its stream.
pub struct WaitHandle {
    ready: oneshot::Receiver<()>,
}

impl WaitHandle {
    pub async fn wait(self) -> Result<(), PairingClosed> {
        self.ready.await.map_err(|_| PairingClosed)
    }
}

/// The rendezvous was destroyed (session expired or dropped) before a second
/// file arrived.
#[derive(Debug, thiserror::Error)]
#[error("session closed before a second file arrived")]
pub struct PairingClosed;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ready_fires_on_complete() {
        let (_tx, stream) = upload_channel("left.txt".to_string());
        let (rendezvous, handle) = Rendezvous::begin(stream);

        let first = rendezvous.complete();
        assert_eq!(first.file_name, "left.txt");
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn wait_pends_until_complete() {
        let (_tx, stream) = upload_channel("left.txt".to_string());
        let (rendezvous, handle) = Rendezvous::begin(stream);

        let wait = tokio::time::timeout(Duration::from_millis(50), handle.wait()).await;
        assert!(wait.is_err(), "wait resolved before the second upload");

        drop(rendezvous);
    }

    #[tokio::test]
    async fn wait_errors_when_rendezvous_dropped() {
        let (_tx, stream) = upload_channel("left.txt".to_string());
        let (rendezvous, handle) = Rendezvous::begin(stream);

        drop(rendezvous);
        assert!(handle.wait().await.is_err());
    }

    #[tokio::test]
    async fn chunks_flow_through_the_channel() {
        let (tx, mut stream) = upload_channel("left.txt".to_string());

        tx.send(Ok(Bytes::from_static(b"a\nb\n"))).await.unwrap();
        drop(tx);

        let chunk = stream.chunks.recv().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"a\nb\n");
        assert!(stream.chunks.recv().await.is_none());
    }
}
