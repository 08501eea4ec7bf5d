//! # ui-navigator
//!
//! Navigation hierarchy and lifecycle manager for layered user interfaces.
//!
//! An application's UI is a tree of Scenes, Windows and Screens. Opening,
//! closing and switching nodes goes through one ordered queue, so lifecycle
//! callbacks of different transitions never interleave.
//!
//! ## Architecture
//!
//! ```text
//! NavigationManager ──► TransitionQueue ──► drain task
//!                                              │
//!             ┌────────────────┬───────────────┼────────────────┐
//!             ▼                ▼               ▼                ▼
//!        NodeFactory     NodeRegistry    NodeLifecycle    VisibilityStack
//!     (create/destroy)  (tree, phases)    (callbacks)    (ordering output)
//! ```
//!
//! Every opened node is represented to its caller by a [`Handle`]. The handle
//! can wait for the node to close, or close it; dropping it closes it.
//!
//! ## Modules
//!
//! - [`manager`] - The façade: open, close, switch, bring to front, shutdown
//! - [`handle`] - Disposable per-node tokens
//! - [`lifecycle`] - The callback contract and node phases
//! - [`factory`] - Instance creation and the key → constructor catalog
//! - [`registry`] - Node tree with parent/child links and active children
//! - [`stack`] - Front-to-back visibility ordering
//! - [`queue`] - Single-drainer command queue with reply tickets
//! - [`kind`] - Node kinds and hierarchy rules
//! - [`config`] - TOML configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod factory;
pub mod handle;
pub mod kind;
pub mod lifecycle;
pub mod manager;
pub mod queue;
pub mod registry;
pub mod stack;

// Re-export commonly used items
pub use config::NavigatorConfig;
pub use error::{NavError, Result};
pub use factory::{CreateContext, NodeCatalog, NodeFactory, OpenRequest, ParentInfo};
pub use handle::Handle;
pub use kind::{HierarchyRules, KindSet, NodeKind};
pub use lifecycle::{LifecycleContext, LifecyclePhase, NodeLifecycle, NodePhase};
pub use manager::{NavigationManager, PopTarget, SwitchOutcome};
pub use queue::{Completer, Ticket, TransitionQueue, ticket};
pub use registry::{NewNode, NodeId, NodeInfo, NodeRecord, NodeRegistry};
pub use stack::{Removal, StackEntry, VisibilityStack};

// Callers need the token type to cancel waits and requests
pub use tokio_util::sync::CancellationToken;
