//! Node factory - where node instances come from and go to.
//!
//! The navigator never loads assets itself. It hands an opaque key to a
//! [`NodeFactory`] and gets back something implementing [`NodeLifecycle`].
//! After a node has fully closed the instance is handed back through
//! `destroy_instance`, never earlier.
//!
//! [`NodeCatalog`] is the stock factory: an explicit table from string keys
//! to constructor functions, filled in once at startup.
//!
//! # Example
//!
//! ```ignore
//! let catalog = NodeCatalog::new()
//!     .with("Title", |_ctx| Ok(Arc::new(TitleScreen) as Arc<dyn NodeLifecycle>))
//!     .with("Settings", |ctx| {
//!         let volume = ctx.take_params::<u8>().unwrap_or(80);
//!         Ok(Arc::new(SettingsScreen::new(volume)) as Arc<dyn NodeLifecycle>)
//!     });
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kind::NodeKind;
use crate::lifecycle::NodeLifecycle;
use crate::registry::NodeId;

// =============================================================================
// Requests
// =============================================================================

/// What to open: kind, factory key and optional parameters.
pub struct OpenRequest {
    pub kind: NodeKind,
    pub key: String,
    /// Explicit node id (e.g. derived from a host handle). Allocated if `None`.
    pub id: Option<NodeId>,
    params: Option<Box<dyn Any + Send>>,
}

impl OpenRequest {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            id: None,
            params: None,
        }
    }

    pub fn scene(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Scene, key)
    }

    pub fn window(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Window, key)
    }

    pub fn screen(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Screen, key)
    }

    /// Attach a typed parameter for the constructor.
    pub fn with_params<P: Any + Send>(mut self, params: P) -> Self {
        self.params = Some(Box::new(params));
        self
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn into_context(self, parent: Option<ParentInfo>) -> CreateContext {
        CreateContext {
            kind: self.kind,
            key: self.key,
            parent,
            params: self.params,
        }
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("id", &self.id)
            .field("params", &self.params.as_ref().map(|_| "..."))
            .finish()
    }
}

/// The parent a new node is being created under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentInfo {
    pub id: NodeId,
    pub kind: NodeKind,
}

/// Everything a factory gets to build an instance.
pub struct CreateContext {
    pub kind: NodeKind,
    pub key: String,
    pub parent: Option<ParentInfo>,
    params: Option<Box<dyn Any + Send>>,
}

impl CreateContext {
    /// Borrow the parameters if they are of type `P`.
    pub fn params<P: Any>(&self) -> Option<&P> {
        self.params.as_ref()?.downcast_ref::<P>()
    }

    /// Take the parameters if they are of type `P`.
    pub fn take_params<P: Any>(&mut self) -> Option<P> {
        let params = self.params.take()?;
        match params.downcast::<P>() {
            Ok(params) => Some(*params),
            Err(other) => {
                self.params = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for CreateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateContext")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Factory Trait
// =============================================================================

/// Host-side instance creation and teardown.
#[async_trait]
pub trait NodeFactory: Send + Sync {
    /// Build the instance for `ctx.key`. `Ok(None)` means "no such node".
    async fn create_instance(
        &self,
        ctx: CreateContext,
    ) -> anyhow::Result<Option<Arc<dyn NodeLifecycle>>>;

    /// Release an instance after its close callbacks completed.
    async fn destroy_instance(&self, _id: NodeId, _instance: Arc<dyn NodeLifecycle>) {}
}

// =============================================================================
// Catalog
// =============================================================================

type Constructor =
    Box<dyn Fn(&mut CreateContext) -> anyhow::Result<Arc<dyn NodeLifecycle>> + Send + Sync>;

type DestroyHook = Box<dyn Fn(NodeId) + Send + Sync>;

/// Key → constructor table.
#[derive(Default)]
pub struct NodeCatalog {
    constructors: HashMap<String, Constructor>,
    destroy_hooks: Vec<DestroyHook>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `key`.
    pub fn register<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&mut CreateContext) -> anyhow::Result<Arc<dyn NodeLifecycle>> + Send + Sync + 'static,
    {
        self.constructors.insert(key.into(), Box::new(constructor));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, key: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&mut CreateContext) -> anyhow::Result<Arc<dyn NodeLifecycle>> + Send + Sync + 'static,
    {
        self.register(key, constructor);
        self
    }

    /// Run `hook` whenever an instance is released.
    pub fn on_destroy(&mut self, hook: impl Fn(NodeId) + Send + Sync + 'static) {
        self.destroy_hooks.push(Box::new(hook));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for NodeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCatalog")
            .field("keys", &self.keys())
            .field("destroy_hooks", &self.destroy_hooks.len())
            .finish()
    }
}

#[async_trait]
impl NodeFactory for NodeCatalog {
    async fn create_instance(
        &self,
        mut ctx: CreateContext,
    ) -> anyhow::Result<Option<Arc<dyn NodeLifecycle>>> {
        match self.constructors.get(&ctx.key) {
            Some(constructor) => constructor(&mut ctx).map(Some),
            None => Ok(None),
        }
    }

    async fn destroy_instance(&self, id: NodeId, _instance: Arc<dyn NodeLifecycle>) {
        for hook in &self.destroy_hooks {
            hook(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Plain;

    impl NodeLifecycle for Plain {}

    fn plain(_ctx: &mut CreateContext) -> anyhow::Result<Arc<dyn NodeLifecycle>> {
        Ok(Arc::new(Plain))
    }

    #[tokio::test]
    async fn test_catalog_lookup() {
        let catalog = NodeCatalog::new().with("Title", plain).with("Menu", plain);

        assert_eq!(catalog.keys(), vec!["Menu", "Title"]);

        let found = catalog
            .create_instance(OpenRequest::screen("Title").into_context(None))
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = catalog
            .create_instance(OpenRequest::screen("Nope").into_context(None))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_constructor_error_propagates() {
        let catalog = NodeCatalog::new().with("Broken", |_ctx| anyhow::bail!("prefab missing"));
        let err = catalog
            .create_instance(OpenRequest::screen("Broken").into_context(None))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "prefab missing");
    }

    #[test]
    fn test_params_downcast() {
        let mut ctx = OpenRequest::screen("Score")
            .with_params(2025u32)
            .into_context(None);

        assert_eq!(ctx.params::<u32>(), Some(&2025));
        assert_eq!(ctx.params::<String>(), None);

        // Wrong type leaves the params in place
        assert_eq!(ctx.take_params::<String>(), None);
        assert_eq!(ctx.take_params::<u32>(), Some(2025));
        assert_eq!(ctx.take_params::<u32>(), None);
    }

    #[tokio::test]
    async fn test_destroy_hooks() {
        let released = Arc::new(AtomicU64::new(0));
        let seen = released.clone();

        let mut catalog = NodeCatalog::new();
        catalog.on_destroy(move |id| seen.store(id.raw(), Ordering::SeqCst));

        catalog
            .destroy_instance(NodeId::from_raw(12), Arc::new(Plain))
            .await;
        assert_eq!(released.load(Ordering::SeqCst), 12);
    }
}
