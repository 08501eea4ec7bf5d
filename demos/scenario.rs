//! Walk a small UI through open, switch, close and shutdown.
//!
//! Usage: `cargo run --example scenario [navigator.toml]`
//! Set `RUST_LOG=ui_navigator=debug` to see every callback.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use ui_navigator::{
    LifecycleContext, NavigationManager, NavigatorConfig, NodeCatalog, NodeLifecycle, OpenRequest,
};

/// Logs gaining and losing focus.
struct Panel;

#[async_trait]
impl NodeLifecycle for Panel {
    async fn on_open_out(&self, ctx: &LifecycleContext) -> anyhow::Result<()> {
        info!("{} '{}' has focus", ctx.kind, ctx.key);
        Ok(())
    }

    async fn on_close_in(&self, ctx: &LifecycleContext) -> anyhow::Result<()> {
        info!("{} '{}' lost focus", ctx.kind, ctx.key);
        Ok(())
    }
}

fn print_ordering(nav: &NavigationManager, label: &str) {
    let rows: Vec<String> = nav
        .ordering()
        .iter()
        .filter_map(|entry| {
            nav.node(entry.node)
                .map(|node| format!("{}:{}", entry.order, node.key))
        })
        .collect();
    println!("{label:<24} [{}]", rows.join(", "));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ui_navigator=info".parse()?),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            NavigatorConfig::load(Path::new(&path))?
        }
        None => NavigatorConfig::default(),
    };

    let mut catalog = NodeCatalog::new();
    for key in ["Main", "Lobby", "Title", "Settings", "Credits"] {
        catalog.register(key, |_ctx| Ok(Arc::new(Panel) as Arc<dyn NodeLifecycle>));
    }
    catalog.on_destroy(|id| info!("released instance {}", id));

    let nav = NavigationManager::with_config(Arc::new(catalog), &config);

    let scene = nav.open(OpenRequest::scene("Main"), None).await?;
    let window = nav
        .open(OpenRequest::window("Lobby"), Some(scene.id()))
        .await?;
    let title = nav
        .open(OpenRequest::screen("Title"), Some(window.id()))
        .await?;
    print_ordering(&nav, "opened title");

    let settings = nav
        .switch(window.id(), OpenRequest::screen("Settings"))
        .await
        .into_handle()?;
    print_ordering(&nav, "switched to settings");
    anyhow::ensure!(!title.is_valid(), "title should have closed on switch");

    let credits = nav
        .open(OpenRequest::screen("Credits"), Some(window.id()))
        .await?;
    print_ordering(&nav, "opened credits");

    nav.bring_to_front(settings.id()).await?;
    print_ordering(&nav, "settings to front");

    credits.close().await?;
    print_ordering(&nav, "closed credits");

    nav.shutdown().await?;
    print_ordering(&nav, "after shutdown");
    Ok(())
}
