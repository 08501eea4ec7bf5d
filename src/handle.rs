//! Handle - a caller's claim on an opened node.
//!
//! Returned by a successful open. A handle holds only the node id and a weak
//! reference to the manager; it never touches registry state directly, it
//! only queues close requests.
//!
//! - `wait_closed` - suspend until the node is closed (or close it on cancel)
//! - `dispose` - request a close; safe to call any number of times
//! - dropping the handle disposes it, unless it was `detach`ed
//!
//! # Example
//!
//! ```ignore
//! let dialog = nav.open(OpenRequest::screen("Confirm"), Some(window)).await?;
//!
//! // Wait for the user to dismiss it, or give up after the timeout
//! let cancel = CancellationToken::new();
//! let timer = cancel.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(30)).await;
//!     timer.cancel();
//! });
//! dialog.wait_closed(&cancel).await?;
//! ```

use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NavError, Result};
use crate::kind::NodeKind;
use crate::lifecycle::NodePhase;
use crate::manager::{Inner, NavigationManager};
use crate::registry::NodeId;

/// Disposable token for an opened node.
pub struct Handle {
    id: NodeId,
    kind: NodeKind,
    key: String,
    manager: Weak<Inner>,
    phase: watch::Receiver<NodePhase>,
    disposed: AtomicBool,
    detached: bool,
}

impl Handle {
    pub(crate) fn new(
        id: NodeId,
        kind: NodeKind,
        key: String,
        manager: Weak<Inner>,
        phase: watch::Receiver<NodePhase>,
    ) -> Self {
        Self {
            id,
            kind,
            key,
            manager,
            phase,
            disposed: AtomicBool::new(false),
            detached: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Latest phase of the node. A dropped manager reads as `Closed`.
    pub fn phase(&self) -> NodePhase {
        if self.manager.strong_count() == 0 {
            return NodePhase::Closed;
        }
        *self.phase.borrow()
    }

    /// False from the instant the node reaches `Closed`.
    pub fn is_valid(&self) -> bool {
        self.phase() != NodePhase::Closed
    }

    /// The manager this node belongs to, if it is still alive.
    pub fn manager(&self) -> Option<NavigationManager> {
        self.manager.upgrade().map(NavigationManager::from_inner)
    }

    /// Wait until the node is closed.
    ///
    /// If `cancel` fires first (or already has), the node is closed on the
    /// caller's behalf and `Cancelled` is returned. That compensating close
    /// is best effort: its failures are logged, never returned.
    pub async fn wait_closed(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.is_valid() {
            return Ok(());
        }

        let mut phase = self.phase.clone();
        let closed = async move {
            // A dropped sender means the manager is gone: treat as closed
            let _ = phase.wait_for(|p| *p == NodePhase::Closed).await;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = closed => return Ok(()),
        }

        debug!(node = %self.id, "wait cancelled, closing node");
        if let Some(manager) = self.manager() {
            match manager.close(self.id).await {
                Ok(()) | Err(NavError::NotFound(_)) | Err(NavError::ShutDown) => {}
                Err(e) => warn!(node = %self.id, error = %e, "compensating close failed"),
            }
        }
        Err(NavError::Cancelled)
    }

    /// Request a close without waiting. Idempotent; a no-op once closed.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) || !self.is_valid() {
            return;
        }
        let Some(manager) = self.manager() else {
            return;
        };
        match manager.request_close(self.id, &CancellationToken::new()) {
            Ok(_ticket) => debug!(node = %self.id, "dispose requested close"),
            Err(NavError::NoRuntime) => {
                warn!(node = %self.id, "handle disposed outside a tokio runtime; node stays open")
            }
            Err(e) => debug!(node = %self.id, error = %e, "dispose could not queue close"),
        }
    }

    /// Close the node and wait for it. A no-op if it is already closed.
    pub async fn close(self) -> Result<()> {
        self.disposed.store(true, Ordering::SeqCst);
        if !self.is_valid() {
            return Ok(());
        }
        match self.manager() {
            Some(manager) => match manager.close(self.id).await {
                Err(NavError::NotFound(_)) => Ok(()),
                other => other,
            },
            None => Ok(()),
        }
    }

    /// Give up the handle without closing the node.
    pub fn detach(mut self) -> NodeId {
        self.detached = true;
        self.id
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.detached {
            self.dispose();
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orphan(phase: NodePhase) -> (Handle, watch::Sender<NodePhase>) {
        let (tx, rx) = watch::channel(phase);
        let handle = Handle::new(
            NodeId::from_raw(3),
            NodeKind::Screen,
            "Orphan".to_string(),
            Weak::new(),
            rx,
        );
        (handle, tx)
    }

    #[test]
    fn test_handle_without_manager_is_closed() {
        let (handle, _tx) = orphan(NodePhase::Open);

        assert_eq!(handle.phase(), NodePhase::Closed);
        assert!(!handle.is_valid());
        assert!(handle.manager().is_none());

        // Nothing to close; must not panic
        handle.dispose();
        handle.dispose();
    }

    #[tokio::test]
    async fn test_wait_and_close_without_manager() {
        let (handle, _tx) = orphan(NodePhase::Open);
        handle.wait_closed(&CancellationToken::new()).await.unwrap();
        handle.close().await.unwrap();
    }

    #[test]
    fn test_detach_returns_id() {
        let (handle, _tx) = orphan(NodePhase::Open);
        assert_eq!(handle.detach(), NodeId::from_raw(3));
    }

    #[test]
    fn test_debug_output() {
        let (handle, _tx) = orphan(NodePhase::Open);
        let text = format!("{handle:?}");
        assert!(text.contains("Orphan"));
        assert!(text.contains("Screen"));
    }
}
