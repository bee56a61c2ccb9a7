use std::sync::Arc;

use anyhow::{Context, Result};
use popout::host::memory::{ManagerOpener, MemoryWindowHost};
use popout::{
    ChildEvent, ManagerConfig, OpenOptions, PopoutChild, PopoutManager, ScreenSize, WindowEvent,
    WindowMode,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const ORIGIN: &str = "http://localhost:5173";

fn main() {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let config = ManagerConfig::from_env().unwrap_or_else(|err| {
        eprintln!("Failed to load popout configuration: {err}. Using defaults.");
        ManagerConfig::default()
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        });

    if let Err(err) = rt.block_on(simulate(config)) {
        eprintln!("Simulation failed: {err:#}");
        std::process::exit(1);
    }
}

/// Walks one page through the full popout lifecycle on the in-memory host.
async fn simulate(config: ManagerConfig) -> Result<()> {
    let host = Arc::new(MemoryWindowHost::new(
        ORIGIN,
        ScreenSize {
            width: 1920,
            height: 1080,
        },
    ));
    let manager = PopoutManager::new(host.clone(), config);

    manager.on_ready(|id| {
        tracing::info!(popout_id = %id, "popout ready");
        Ok(())
    });
    manager.on_close(|id| {
        tracing::info!(popout_id = %id, "popout closed");
        Ok(())
    });
    manager.on_error(|err, id| match id {
        Some(id) => tracing::error!(popout_id = %id, error = %err, "popout error"),
        None => tracing::error!(error = %err, "popout error"),
    });
    manager.add_message_handler(|message| {
        let kind = popout::message::message_kind(message).unwrap_or("<untyped>");
        tracing::info!(kind, "message from popout");
        Ok(())
    });
    let reaper = manager.spawn_reaper();

    let shipment = manager
        .open_window(
            "/shipments/edit",
            [("tab", "stops")],
            OpenOptions::new().mode(WindowMode::Edit).record_id("shp_1042"),
        )
        .context("open shipment popout")?;
    let invoice = manager
        .open_window(
            "/billing/invoices/new",
            [("customer", "cus_77")],
            OpenOptions::new().size(960, 720),
        )
        .context("open invoice popout")?;

    let mut children = Vec::new();
    for id in [shipment, invoice] {
        let window = host
            .window_named(&id.to_string())
            .context("host lost an opened window")?;
        window.fire(WindowEvent::Load);

        let opener = Arc::new(ManagerOpener::new(manager.clone(), ORIGIN));
        let child = PopoutChild::from_url(&format!("{ORIGIN}{}", window.url()), opener)?
            .context("popout url carries no popoutId")?;
        tracing::info!(popout_id = %id, layout = ?child.layout(), "child attached");
        child.announce_ready();
        children.push(child);
    }

    manager.broadcast_message("sync-state", json!({ "revision": 1 }));
    tracing::info!(active = manager.list_active().len(), "broadcast sent");

    if let Some(invoice_child) = children.iter().find(|child| child.popout_id() == invoice) {
        invoice_child.forward(ChildEvent::BeforeUnload);
    }

    if let Some(window) = host.window_named(&shipment.to_string()) {
        window.crash();
    }
    let reaped = manager.sweep_stale();
    tracing::info!(reaped = reaped.len(), "stale sweep finished");

    manager.close_all_windows();
    reaper.shutdown().await;
    tracing::info!(active = manager.list_active().len(), "simulation finished");
    Ok(())
}
