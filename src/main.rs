use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use vhostd::config::{Config, HostConfig};
use vhostd::handlers::{DynamicHandler, EmbeddedHandler, Handler, StaticFileHandler};
use vhostd::routing::{Registry, ResourceClass};
use vhostd::server::{Dispatcher, Server};

const WELCOME_PAGE: &[u8] = b"<!DOCTYPE html>\n<html><head><title>vhostd</title>\
<link rel=\"stylesheet\" href=\"/resource/style.css\"></head>\
<body><h1>It works</h1><p>This host is served by vhostd.</p></body></html>\n";
const STYLESHEET: &[u8] = b"body { font-family: sans-serif; margin: 3em; }\n";
const ROBOTS: &[u8] = b"User-agent: *\nDisallow:\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load().context("loading configuration")?;

    let mut registry = Registry::new();
    for host in &cfg.hosts {
        register(&mut registry, host)?;
    }

    let server = Server::bind(&cfg, Dispatcher::new(registry)).await?;
    let handle = server.shutdown_handle();
    let running = tokio::spawn(server.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    handle.shutdown();

    running.await??;
    Ok(())
}

/// Installs the built-in handlers for one configured host.
fn register(registry: &mut Registry, host: &HostConfig) -> anyhow::Result<()> {
    registry.register_host(host)?;

    if let Some(root) = &host.static_root {
        let files: Arc<dyn Handler> = Arc::new(StaticFileHandler::new(root));
        registry.insert_class(&host.name, ResourceClass::Static, "/", &host.default_resource, files)?;
    }

    let assets: Arc<dyn Handler> = Arc::new(
        EmbeddedHandler::new()
            .with_asset("welcome.html", WELCOME_PAGE)
            .with_asset("style.css", STYLESHEET)
            .with_asset("robots.txt", ROBOTS)
            .with_index("welcome.html"),
    );
    registry.insert_class(&host.name, ResourceClass::Resource, "/", &host.default_resource, assets)?;

    let host_name = host.name.clone();
    let info: Arc<dyn Handler> = Arc::new(DynamicHandler::new(move |ctx, request, response| {
        use std::io::Write;

        response.set_mime("text/plain; charset=utf-8")?;
        writeln!(response, "host: {}", host_name).map_err(anyhow::Error::from)?;
        writeln!(response, "connection: {}", ctx.connection_id).map_err(anyhow::Error::from)?;
        writeln!(response, "method: {}", request.method()).map_err(anyhow::Error::from)?;
        writeln!(response, "uri: {}", request.uri()).map_err(anyhow::Error::from)?;
        writeln!(response, "node: {}", ctx.node_path).map_err(anyhow::Error::from)?;
        writeln!(response, "remaining: {}", ctx.remaining_path()).map_err(anyhow::Error::from)?;
        Ok(())
    }));
    registry.insert_class(&host.name, ResourceClass::Dynamic, "/", "info", info)?;

    Ok(())
}
