//! Lifecycle contract - the five phase callbacks every node implements.
//!
//! The manager drives each node through these callbacks in a fixed order:
//!
//! ```text
//! open:   on_initialize → on_open_in → (previous front: on_close_in) → on_open_out
//! close:  on_close_in → on_close_out → (new front: on_open_out)
//! ```
//!
//! `on_close_in` doubles as "lost focus" and `on_open_out` as "gained focus":
//! a node covered by a newer one receives `on_close_in`, and receives
//! `on_open_out` again when it returns to the front.
//!
//! Every callback is awaited to completion before the next one starts.
//!
//! # Example
//!
//! ```ignore
//! use ui_navigator::{LifecycleContext, NodeLifecycle};
//!
//! struct TitleScreen;
//!
//! #[async_trait::async_trait]
//! impl NodeLifecycle for TitleScreen {
//!     async fn on_open_in(&self, ctx: &LifecycleContext) -> anyhow::Result<()> {
//!         tracing::info!(node = %ctx.id, "title screen visible");
//!         Ok(())
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::{NavError, Result};
use crate::kind::NodeKind;
use crate::registry::NodeId;

// =============================================================================
// Node State
// =============================================================================

/// Lifecycle state of a node id. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NodePhase {
    #[default]
    Unregistered,
    Initializing,
    Open,
    Closing,
    Closed,
}

/// One of the five callbacks of [`NodeLifecycle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Initialize,
    OpenIn,
    CloseIn,
    OpenOut,
    CloseOut,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Initialize => "on_initialize",
            LifecyclePhase::OpenIn => "on_open_in",
            LifecyclePhase::CloseIn => "on_close_in",
            LifecyclePhase::OpenOut => "on_open_out",
            LifecyclePhase::CloseOut => "on_close_out",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Callback Contract
// =============================================================================

/// What a callback knows about the node it runs for.
#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub id: NodeId,
    pub kind: NodeKind,
    pub key: String,
    /// Token of the request that triggered this transition.
    pub cancel: CancellationToken,
}

/// Phase callbacks of a navigation node. All default to no-ops.
///
/// Callbacks run on the navigator's drain task with no internal lock held,
/// so they may query the manager or enqueue further requests. They must not
/// await the completion of a request they enqueued themselves: that request
/// only runs after the current callback returns.
#[async_trait]
pub trait NodeLifecycle: Send + Sync {
    async fn on_initialize(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_open_in(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_close_in(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_open_out(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_close_out(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Run one callback, turning errors, panics and timeouts into
/// [`NavError::LifecycleCallbackFailed`].
pub(crate) async fn invoke(
    node: &dyn NodeLifecycle,
    phase: LifecyclePhase,
    ctx: &LifecycleContext,
    timeout: Option<Duration>,
) -> Result<()> {
    let call = async {
        match phase {
            LifecyclePhase::Initialize => node.on_initialize(ctx).await,
            LifecyclePhase::OpenIn => node.on_open_in(ctx).await,
            LifecyclePhase::CloseIn => node.on_close_in(ctx).await,
            LifecyclePhase::OpenOut => node.on_open_out(ctx).await,
            LifecyclePhase::CloseOut => node.on_close_out(ctx).await,
        }
    };
    let guarded = AssertUnwindSafe(call).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(failure(ctx.id, phase, format!("timed out after {limit:?}")));
            }
        },
        None => guarded.await,
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(failure(ctx.id, phase, format!("{e:#}"))),
        Err(panic) => Err(failure(ctx.id, phase, panic_message(panic.as_ref()))),
    }
}

fn failure(id: NodeId, phase: LifecyclePhase, reason: String) -> NavError {
    NavError::LifecycleCallbackFailed { id, phase, reason }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;

    #[async_trait]
    impl NodeLifecycle for Quiet {}

    struct Failing;

    #[async_trait]
    impl NodeLifecycle for Failing {
        async fn on_open_in(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
            anyhow::bail!("no assets")
        }

        async fn on_close_out(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
            panic!("boom")
        }

        async fn on_open_out(&self, _ctx: &LifecycleContext) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn ctx() -> LifecycleContext {
        LifecycleContext {
            id: NodeId::from_raw(3),
            kind: NodeKind::Screen,
            key: "Title".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_default_callbacks_succeed() {
        for phase in [
            LifecyclePhase::Initialize,
            LifecyclePhase::OpenIn,
            LifecyclePhase::CloseIn,
            LifecyclePhase::OpenOut,
            LifecyclePhase::CloseOut,
        ] {
            assert!(invoke(&Quiet, phase, &ctx(), None).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_error_is_reported_with_phase() {
        let err = invoke(&Failing, LifecyclePhase::OpenIn, &ctx(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            NavError::LifecycleCallbackFailed {
                id: NodeId::from_raw(3),
                phase: LifecyclePhase::OpenIn,
                reason: "no assets".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let err = invoke(&Failing, LifecyclePhase::CloseOut, &ctx(), None)
            .await
            .unwrap_err();
        match err {
            NavError::LifecycleCallbackFailed { phase, reason, .. } => {
                assert_eq!(phase, LifecyclePhase::CloseOut);
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let err = invoke(
            &Failing,
            LifecyclePhase::OpenOut,
            &ctx(),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            NavError::LifecycleCallbackFailed {
                phase: LifecyclePhase::OpenOut,
                ..
            }
        ));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(LifecyclePhase::Initialize.to_string(), "on_initialize");
        assert_eq!(LifecyclePhase::CloseOut.to_string(), "on_close_out");
    }
}
