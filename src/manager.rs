//! Navigation Manager - the façade over registry, queue, stack and lifecycle.
//!
//! Every request becomes a command on the [`TransitionQueue`]. A single
//! drain task executes commands one at a time, so the registry and the
//! visibility stack only ever change inside that task:
//!
//! ```text
//! open / close / switch / bring_to_front
//!        │
//!        ▼
//! TransitionQueue ──► drain task ──► registry + lifecycle callbacks + stack
//!                                            │
//!                                            ▼
//!                                   ordering watch channel ──► renderer
//! ```
//!
//! Node states: `Unregistered → Initializing → Open → Closing → Closed`.
//! `Closed` is terminal and the id is retired.
//!
//! The manager is an explicit context object: create one at startup, clone
//! it into whatever needs to navigate, call [`shutdown`] at exit.
//!
//! # Example
//!
//! ```ignore
//! let nav = NavigationManager::new(catalog);
//!
//! let scene = nav.open(OpenRequest::scene("Main"), None).await?;
//! let window = nav.open(OpenRequest::window("Lobby"), Some(scene.id())).await?;
//! let title = nav.open(OpenRequest::screen("Title"), Some(window.id())).await?;
//!
//! // Replace the window's active screen
//! let settings = nav.switch(window.id(), OpenRequest::screen("Settings")).await.into_handle()?;
//!
//! nav.shutdown().await?;
//! ```
//!
//! [`shutdown`]: NavigationManager::shutdown

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::NavigatorConfig;
use crate::error::{NavError, Result};
use crate::factory::{NodeFactory, OpenRequest, ParentInfo};
use crate::handle::Handle;
use crate::kind::HierarchyRules;
use crate::lifecycle::{self, LifecycleContext, LifecyclePhase, NodeLifecycle, NodePhase};
use crate::queue::{self, Completer, Ticket, TransitionQueue};
use crate::registry::{NewNode, NodeId, NodeInfo, NodeRegistry};
use crate::stack::{StackEntry, VisibilityStack};

// =============================================================================
// Commands
// =============================================================================

/// Which node a pop command closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopTarget {
    Node(NodeId),
    /// Whatever child of this node is active when the command runs.
    ActiveChildOf(NodeId),
}

/// Links the two halves of a switch: a failed pop stores its error here
/// and the push that follows is skipped with it.
type SwitchGate = Arc<Mutex<Option<NavError>>>;

/// A queued transition with its reply channel.
#[derive(Debug)]
enum TransitionCommand {
    Push {
        request: OpenRequest,
        parent: Option<NodeId>,
        cancel: CancellationToken,
        gate: Option<SwitchGate>,
        reply: Completer<Handle>,
    },
    Pop {
        target: PopTarget,
        cancel: CancellationToken,
        gate: Option<SwitchGate>,
        reply: Completer<Option<NodeId>>,
    },
    BringToFront {
        id: NodeId,
        reply: Completer<()>,
    },
    Shutdown {
        reply: Completer<()>,
    },
}

/// Result of [`NavigationManager::switch`]. Each half reports on its own.
#[derive(Debug)]
pub struct SwitchOutcome {
    /// The child that was closed, `None` if the parent had no active child.
    pub closed: Result<Option<NodeId>>,
    pub opened: Result<Handle>,
}

impl SwitchOutcome {
    /// The handle of the opened node, or the first error of either half.
    ///
    /// When the close half failed but the open half succeeded, the new
    /// node stays open and its handle is returned.
    pub fn into_handle(self) -> Result<Handle> {
        match (self.closed, self.opened) {
            (_, Ok(handle)) => Ok(handle),
            (Err(close_err), Err(_)) => Err(close_err),
            (Ok(_), Err(open_err)) => Err(open_err),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Registry payload: the live instance and the phase broadcast for handles.
struct Slot {
    instance: Arc<dyn NodeLifecycle>,
    phase: watch::Sender<NodePhase>,
}

struct NavState {
    registry: NodeRegistry<Slot>,
    stack: VisibilityStack,
    shut_down: bool,
}

impl NavState {
    fn set_phase(&mut self, id: NodeId, phase: NodePhase) -> Result<()> {
        self.registry.set_phase(id, phase)?;
        if let Some(record) = self.registry.get(id) {
            record.payload().phase.send_replace(phase);
        }
        Ok(())
    }

    /// Instance and callback context for `id`.
    fn callee(
        &self,
        id: NodeId,
        cancel: &CancellationToken,
    ) -> Option<(Arc<dyn NodeLifecycle>, LifecycleContext)> {
        let record = self.registry.get(id)?;
        let ctx = LifecycleContext {
            id,
            kind: record.kind(),
            key: record.key().to_string(),
            cancel: cancel.clone(),
        };
        Some((record.payload().instance.clone(), ctx))
    }
}

pub(crate) struct Inner {
    queue: TransitionQueue<TransitionCommand>,
    state: Mutex<NavState>,
    factory: Arc<dyn NodeFactory>,
    rules: HierarchyRules,
    callback_timeout: Option<Duration>,
    publish_ordering: bool,
    ordering: watch::Sender<Vec<StackEntry>>,
}

// =============================================================================
// Public API
// =============================================================================

/// Cloneable handle to one navigation tree.
#[derive(Clone)]
pub struct NavigationManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NavigationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("NavigationManager")
            .field("nodes", &state.registry.len())
            .field("stack", &state.stack.ids())
            .field("pending", &self.inner.queue.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

impl NavigationManager {
    /// Manager with the default configuration.
    pub fn new(factory: impl NodeFactory + 'static) -> Self {
        Self::with_config(Arc::new(factory), &NavigatorConfig::default())
    }

    pub fn with_config(factory: Arc<dyn NodeFactory>, config: &NavigatorConfig) -> Self {
        let (ordering, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                queue: TransitionQueue::new(),
                state: Mutex::new(NavState {
                    registry: NodeRegistry::new(),
                    stack: VisibilityStack::new(),
                    shut_down: false,
                }),
                factory,
                rules: config.hierarchy_rules(),
                callback_timeout: config.callback_timeout(),
                publish_ordering: config.publish_ordering,
                ordering,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    // -------------------------------------------------------------------------
    // Open
    // -------------------------------------------------------------------------

    /// Open a node under `parent` (`None` = root) and wait until it is open.
    pub async fn open(&self, request: OpenRequest, parent: Option<NodeId>) -> Result<Handle> {
        self.open_with_cancel(request, parent, &CancellationToken::new())
            .await
    }

    /// Like [`open`](Self::open), honoring `cancel`.
    ///
    /// If `cancel` fires before the command starts, nothing happens. If it
    /// fires while the open runs, the open completes and the node is then
    /// closed again before `Cancelled` is returned.
    pub async fn open_with_cancel(
        &self,
        request: OpenRequest,
        parent: Option<NodeId>,
        cancel: &CancellationToken,
    ) -> Result<Handle> {
        let handle = self.request_open(request, parent, cancel)?.await?;
        if cancel.is_cancelled() {
            debug!(node = %handle.id(), "open cancelled after completion, closing again");
            if let Err(e) = handle.close().await {
                warn!(error = %e, "compensating close failed");
            }
            return Err(NavError::Cancelled);
        }
        Ok(handle)
    }

    /// Queue an open without waiting for it.
    ///
    /// This is the form to use from inside lifecycle callbacks.
    pub fn request_open(
        &self,
        request: OpenRequest,
        parent: Option<NodeId>,
        cancel: &CancellationToken,
    ) -> Result<Ticket<Handle>> {
        let (reply, ticket) = queue::ticket();
        self.inner.submit(vec![TransitionCommand::Push {
            request,
            parent,
            cancel: cancel.clone(),
            gate: None,
            reply,
        }])?;
        Ok(ticket)
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Close an open node and wait until it is closed.
    ///
    /// Fails with `NotFound` if the node is not open and with
    /// `HasOpenChildren` if any of its children is still open.
    pub async fn close(&self, id: NodeId) -> Result<()> {
        self.close_with_cancel(id, &CancellationToken::new()).await
    }

    pub async fn close_with_cancel(&self, id: NodeId, cancel: &CancellationToken) -> Result<()> {
        self.request_close(id, cancel)?.await.map(|_| ())
    }

    /// Queue a close without waiting for it.
    pub fn request_close(
        &self,
        id: NodeId,
        cancel: &CancellationToken,
    ) -> Result<Ticket<Option<NodeId>>> {
        let (reply, ticket) = queue::ticket();
        self.inner.submit(vec![TransitionCommand::Pop {
            target: PopTarget::Node(id),
            cancel: cancel.clone(),
            gate: None,
            reply,
        }])?;
        Ok(ticket)
    }

    // -------------------------------------------------------------------------
    // Switch
    // -------------------------------------------------------------------------

    /// Close `parent`'s active child, then open `request` under `parent`.
    ///
    /// Runs as two consecutive commands. If the close is rejected or fails,
    /// the open is skipped and reports the same error. If the open fails
    /// after the close succeeded, the close is not undone.
    pub async fn switch(&self, parent: NodeId, request: OpenRequest) -> SwitchOutcome {
        self.switch_with_cancel(parent, request, &CancellationToken::new())
            .await
    }

    pub async fn switch_with_cancel(
        &self,
        parent: NodeId,
        request: OpenRequest,
        cancel: &CancellationToken,
    ) -> SwitchOutcome {
        match self.request_switch(parent, request, cancel) {
            Ok((closed, opened)) => SwitchOutcome {
                closed: closed.await,
                opened: opened.await,
            },
            Err(e) => SwitchOutcome {
                closed: Err(e.clone()),
                opened: Err(e),
            },
        }
    }

    /// Queue both halves of a switch without waiting.
    pub fn request_switch(
        &self,
        parent: NodeId,
        request: OpenRequest,
        cancel: &CancellationToken,
    ) -> Result<(Ticket<Option<NodeId>>, Ticket<Handle>)> {
        let (close_reply, closed) = queue::ticket();
        let (open_reply, opened) = queue::ticket();
        let gate = SwitchGate::default();
        self.inner.submit(vec![
            TransitionCommand::Pop {
                target: PopTarget::ActiveChildOf(parent),
                cancel: cancel.clone(),
                gate: Some(gate.clone()),
                reply: close_reply,
            },
            TransitionCommand::Push {
                request,
                parent: Some(parent),
                cancel: cancel.clone(),
                gate: Some(gate),
                reply: open_reply,
            },
        ])?;
        Ok((closed, opened))
    }

    // -------------------------------------------------------------------------
    // Ordering
    // -------------------------------------------------------------------------

    /// Move an open node to the front. No lifecycle callbacks run.
    pub async fn bring_to_front(&self, id: NodeId) -> Result<()> {
        self.request_bring_to_front(id)?.await
    }

    pub fn request_bring_to_front(&self, id: NodeId) -> Result<Ticket<()>> {
        let (reply, ticket) = queue::ticket();
        self.inner
            .submit(vec![TransitionCommand::BringToFront { id, reply }])?;
        Ok(ticket)
    }

    /// Receive the front-to-back ordering after every stack change.
    pub fn subscribe_ordering(&self) -> watch::Receiver<Vec<StackEntry>> {
        self.inner.ordering.subscribe()
    }

    // -------------------------------------------------------------------------
    // Shutdown
    // -------------------------------------------------------------------------

    /// Close every open node, children before parents, then refuse any
    /// further request with `ShutDown`.
    ///
    /// Commands queued before this call still run first.
    pub async fn shutdown(&self) -> Result<()> {
        if self.is_shut_down() {
            return Ok(());
        }
        let (reply, ticket) = queue::ticket();
        self.inner
            .submit(vec![TransitionCommand::Shutdown { reply }])?;
        ticket.await
    }

    // -------------------------------------------------------------------------
    // Snapshot Queries
    // -------------------------------------------------------------------------
    //
    // These read the current state without going through the queue, so a
    // command in flight may not be reflected yet.

    /// Phase of `id`; retired ids report `Closed`, unknown ids `None`.
    pub fn phase(&self, id: NodeId) -> Option<NodePhase> {
        let state = self.inner.state.lock();
        state.registry.phase(id).or_else(|| {
            state
                .registry
                .is_retired(id)
                .then_some(NodePhase::Closed)
        })
    }

    pub fn is_open(&self, id: NodeId) -> bool {
        self.phase(id) == Some(NodePhase::Open)
    }

    pub fn node(&self, id: NodeId) -> Option<NodeInfo> {
        self.inner.state.lock().registry.get(id).map(|n| n.info())
    }

    pub fn active_child(&self, parent: NodeId) -> Option<NodeId> {
        self.inner.state.lock().registry.active_child(parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner.state.lock().registry.children(id)
    }

    /// Current ordering output, front first.
    pub fn ordering(&self) -> Vec<StackEntry> {
        self.inner.state.lock().stack.entries()
    }

    /// Node ids on the visibility stack, front first.
    pub fn stack(&self) -> Vec<NodeId> {
        self.inner.state.lock().stack.ids()
    }

    pub fn front(&self) -> Option<NodeId> {
        self.inner.state.lock().stack.front()
    }

    /// Number of registered nodes (any phase before `Closed`).
    pub fn node_count(&self) -> usize {
        self.inner.state.lock().registry.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shut_down
    }
}

// =============================================================================
// Drain Loop
// =============================================================================

impl Inner {
    /// Enqueue commands, starting a drain task if the queue was idle.
    fn submit(self: &Arc<Self>, commands: Vec<TransitionCommand>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NavError::NoRuntime)?;
        if self.state.lock().shut_down {
            return Err(NavError::ShutDown);
        }

        if self.queue.enqueue_all(commands) {
            runtime.spawn(Arc::clone(self).drain());
        }
        Ok(())
    }

    async fn drain(self: Arc<Self>) {
        debug!("drain started");
        while let Some(command) = self.queue.next() {
            // Callback panics are already caught in `lifecycle::invoke`; this
            // keeps the loop alive if anything else in a command panics.
            if AssertUnwindSafe(self.execute(command))
                .catch_unwind()
                .await
                .is_err()
            {
                error!("transition command panicked; continuing with next command");
            }
        }
        debug!("drain idle");
    }

    async fn execute(self: &Arc<Self>, command: TransitionCommand) {
        match command {
            TransitionCommand::Push {
                request,
                parent,
                cancel,
                gate,
                reply,
            } => {
                if let Some(e) = gate.and_then(|gate| gate.lock().take()) {
                    debug!(key = %request.key, error = %e, "switch close failed, open skipped");
                    reply.complete(Err(e));
                    return;
                }
                let outcome = self.push(request, parent, &cancel).await;
                if let Err(e) = &outcome {
                    warn!(error = %e, "open failed");
                }
                reply.complete(outcome);
            }
            TransitionCommand::Pop {
                target,
                cancel,
                gate,
                reply,
            } => {
                let outcome = self.pop(target, &cancel).await;
                if let Err(e) = &outcome {
                    warn!(error = %e, ?target, "close failed");
                    if let Some(gate) = gate {
                        *gate.lock() = Some(e.clone());
                    }
                }
                reply.complete(outcome);
            }
            TransitionCommand::BringToFront { id, reply } => {
                reply.complete(self.bring_to_front(id));
            }
            TransitionCommand::Shutdown { reply } => {
                self.shutdown().await;
                reply.complete(Ok(()));
            }
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state.lock().shut_down {
            Err(NavError::ShutDown)
        } else {
            Ok(())
        }
    }

    async fn invoke(
        &self,
        node: &dyn NodeLifecycle,
        phase: LifecyclePhase,
        ctx: &LifecycleContext,
    ) -> Result<()> {
        debug!(node = %ctx.id, key = %ctx.key, %phase, "callback");
        lifecycle::invoke(node, phase, ctx, self.callback_timeout).await
    }

    /// Focus callback on a node other than the one being transitioned.
    /// Failures are logged and do not affect the running command.
    async fn notify(&self, id: NodeId, phase: LifecyclePhase, cancel: &CancellationToken) {
        let Some((node, ctx)) = self.state.lock().callee(id, cancel) else {
            return;
        };
        if let Err(e) = self.invoke(node.as_ref(), phase, &ctx).await {
            warn!(node = %id, error = %e, "focus callback failed");
        }
    }

    fn publish(&self, state: &NavState) {
        if self.publish_ordering {
            self.ordering.send_replace(state.stack.entries());
        }
    }

    // -------------------------------------------------------------------------
    // Push
    // -------------------------------------------------------------------------

    async fn push(
        self: &Arc<Self>,
        request: OpenRequest,
        parent: Option<NodeId>,
        cancel: &CancellationToken,
    ) -> Result<Handle> {
        if cancel.is_cancelled() {
            return Err(NavError::Cancelled);
        }
        self.ensure_running()?;

        // Validation: nothing is created or registered if any check fails
        let parent_info = {
            let state = self.state.lock();
            if let Some(id) = request.id {
                if state.registry.contains(id) || state.registry.is_retired(id) {
                    return Err(NavError::AlreadyRegistered(id));
                }
            }
            match parent {
                Some(id) => match state.registry.get(id) {
                    Some(record) if record.phase() == NodePhase::Open => Some(ParentInfo {
                        id,
                        kind: record.kind(),
                    }),
                    _ => return Err(NavError::NotFound(id)),
                },
                None => None,
            }
        };
        self.rules
            .check(request.kind, parent_info.map(|p| p.kind))?;

        let kind = request.kind;
        let key = request.key.clone();
        let explicit_id = request.id;

        let created = AssertUnwindSafe(
            self.factory
                .create_instance(request.into_context(parent_info)),
        )
        .catch_unwind()
        .await;
        let instance = match created {
            Ok(Ok(Some(instance))) => instance,
            Ok(Ok(None)) => {
                return Err(NavError::FactoryError {
                    key,
                    reason: "factory returned no instance".to_string(),
                });
            }
            Ok(Err(e)) => {
                return Err(NavError::FactoryError {
                    key,
                    reason: format!("{e:#}"),
                });
            }
            Err(panic) => {
                return Err(NavError::FactoryError {
                    key,
                    reason: lifecycle::panic_message(panic.as_ref()),
                });
            }
        };

        let (phase_tx, phase_rx) = watch::channel(NodePhase::Unregistered);
        let registered = {
            let mut state = self.state.lock();
            let mut node = NewNode::new(
                kind,
                key.clone(),
                Slot {
                    instance: instance.clone(),
                    phase: phase_tx,
                },
            );
            node.id = explicit_id;
            node.parent = parent;

            match state.registry.register(node) {
                Ok(id) => state.set_phase(id, NodePhase::Initializing).map(|()| id),
                Err(e) => Err(e),
            }
        };
        let id = match registered {
            Ok(id) => id,
            Err(e) => {
                error!(%key, error = %e, "registration failed after validation");
                return Err(e);
            }
        };
        debug!(node = %id, %key, %kind, parent = ?parent, "registered");

        let ctx = LifecycleContext {
            id,
            kind,
            key: key.clone(),
            cancel: cancel.clone(),
        };

        for phase in [LifecyclePhase::Initialize, LifecyclePhase::OpenIn] {
            if let Err(e) = self.invoke(instance.as_ref(), phase, &ctx).await {
                self.abort_open(id, None, cancel).await;
                return Err(e);
            }
        }

        // The current front loses focus before the new node gains it
        let previous_front = self.state.lock().stack.front();
        if let Some(previous) = previous_front {
            self.notify(previous, LifecyclePhase::CloseIn, cancel).await;
        }

        if let Err(e) = self
            .invoke(instance.as_ref(), LifecyclePhase::OpenOut, &ctx)
            .await
        {
            self.abort_open(id, previous_front, cancel).await;
            return Err(e);
        }

        {
            let mut state = self.state.lock();
            state.set_phase(id, NodePhase::Open)?;
            state.stack.push(id);
            self.publish(&state);
        }
        info!(node = %id, %key, %kind, "opened");

        Ok(Handle::new(id, kind, key, Arc::downgrade(self), phase_rx))
    }

    /// Undo a partially opened node after a callback failure.
    async fn abort_open(
        &self,
        id: NodeId,
        restore_front: Option<NodeId>,
        cancel: &CancellationToken,
    ) {
        let slot = {
            let mut state = self.state.lock();
            let _ = state.set_phase(id, NodePhase::Closed);
            state.registry.unregister(id)
        };

        if let Some(front) = restore_front {
            self.notify(front, LifecyclePhase::OpenOut, cancel).await;
        }

        match slot {
            Ok(slot) => self.destroy(id, slot.instance).await,
            Err(e) => error!(node = %id, error = %e, "failed to unregister aborted node"),
        }
    }

    /// Hand an instance back to the factory. A panicking factory is logged.
    async fn destroy(&self, id: NodeId, instance: Arc<dyn NodeLifecycle>) {
        let released = AssertUnwindSafe(self.factory.destroy_instance(id, instance))
            .catch_unwind()
            .await;
        if let Err(panic) = released {
            error!(
                node = %id,
                reason = %lifecycle::panic_message(panic.as_ref()),
                "destroy_instance failed"
            );
        }
    }

    // -------------------------------------------------------------------------
    // Pop
    // -------------------------------------------------------------------------

    async fn pop(&self, target: PopTarget, cancel: &CancellationToken) -> Result<Option<NodeId>> {
        if cancel.is_cancelled() {
            return Err(NavError::Cancelled);
        }
        self.ensure_running()?;

        let id = {
            let state = self.state.lock();
            let id = match target {
                PopTarget::Node(id) => id,
                PopTarget::ActiveChildOf(parent) => {
                    if !state.registry.contains(parent) {
                        return Err(NavError::NotFound(parent));
                    }
                    match state.registry.active_child(parent) {
                        Some(child) => child,
                        None => return Ok(None),
                    }
                }
            };

            if state.registry.phase(id) != Some(NodePhase::Open) {
                return Err(NavError::NotFound(id));
            }
            let open_children = state.registry.open_children(id);
            if !open_children.is_empty() {
                return Err(NavError::HasOpenChildren {
                    id,
                    children: open_children,
                });
            }
            id
        };

        self.close_node(id, cancel).await?;
        Ok(Some(id))
    }

    /// Run the close protocol on a validated open node.
    ///
    /// A failing close callback skips the remaining one, but the node is
    /// still torn down; the failure is returned afterwards.
    async fn close_node(&self, id: NodeId, cancel: &CancellationToken) -> Result<()> {
        let (instance, ctx) = {
            let mut state = self.state.lock();
            state.set_phase(id, NodePhase::Closing)?;
            state.callee(id, cancel).ok_or(NavError::NotFound(id))?
        };

        let mut failure = None;
        for phase in [LifecyclePhase::CloseIn, LifecyclePhase::CloseOut] {
            if let Err(e) = self.invoke(instance.as_ref(), phase, &ctx).await {
                failure = Some(e);
                break;
            }
        }

        let new_front = {
            let mut state = self.state.lock();
            state.set_phase(id, NodePhase::Closed)?;
            let removal = state.stack.remove(id);
            self.publish(&state);
            removal.and_then(|r| r.new_front)
        };

        if let Some(front) = new_front {
            self.notify(front, LifecyclePhase::OpenOut, cancel).await;
        }

        let slot = self.state.lock().registry.unregister(id)?;
        drop(instance);
        self.destroy(id, slot.instance).await;
        info!(node = %id, key = %ctx.key, "closed");

        failure.map_or(Ok(()), Err)
    }

    // -------------------------------------------------------------------------
    // Bring to Front
    // -------------------------------------------------------------------------

    fn bring_to_front(&self, id: NodeId) -> Result<()> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(NavError::ShutDown);
        }
        if state.registry.phase(id) != Some(NodePhase::Open) || !state.stack.bring_to_front(id) {
            return Err(NavError::NotFound(id));
        }
        self.publish(&state);
        debug!(node = %id, "brought to front");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Shutdown
    // -------------------------------------------------------------------------

    async fn shutdown(&self) {
        let victims = {
            let state = self.state.lock();
            if state.shut_down {
                return;
            }
            let mut open: Vec<(usize, usize, NodeId)> = state
                .registry
                .ids()
                .into_iter()
                .filter(|&id| state.registry.phase(id) == Some(NodePhase::Open))
                .map(|id| {
                    let position = state.stack.position(id).unwrap_or(usize::MAX);
                    (state.registry.depth(id), position, id)
                })
                .collect();
            // Deepest first, then front first
            open.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            open.into_iter().map(|(_, _, id)| id).collect::<Vec<_>>()
        };

        info!(open = victims.len(), "shutting down");
        let cancel = CancellationToken::new();
        for id in victims {
            if let Err(e) = self.close_node(id, &cancel).await {
                warn!(node = %id, error = %e, "close during shutdown failed");
            }
        }

        self.state.lock().shut_down = true;
        for command in self.queue.drain_pending() {
            reject(command, NavError::ShutDown);
        }
    }
}

fn reject(command: TransitionCommand, error: NavError) {
    match command {
        TransitionCommand::Push { reply, .. } => reply.complete(Err(error)),
        TransitionCommand::Pop { reply, .. } => reply.complete(Err(error)),
        TransitionCommand::BringToFront { reply, .. } => reply.complete(Err(error)),
        TransitionCommand::Shutdown { reply } => reply.complete(Ok(())),
    }
}
