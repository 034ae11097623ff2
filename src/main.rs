use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;

use routekit::config::{load_config, ConfigWatcher, RouterConfig};
use routekit::dispatch::Args;
use routekit::observability::{logging, metrics};
use routekit::{clear_cache, HandlerError, HttpServer, Reply, RequestContext, Router, Shutdown};

#[derive(Parser)]
#[command(name = "routekit")]
#[command(version, about = "HTTP request router", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "routekit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve HTTP traffic (default)
    Serve,
    /// Print the route table
    Routes,
    /// Delete the route table snapshot
    CacheClear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(&cli.config)?;
    logging::init_logging(Some(&config.observability.log_level));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli.config, config).await,
        Commands::Routes => {
            print_routes(&build_router(&config)?);
            Ok(())
        }
        Commands::CacheClear => {
            if clear_cache(&config.cache.path)? {
                println!("Removed {}", config.cache.path.display());
            } else {
                println!("No route cache at {}", config.cache.path.display());
            }
            Ok(())
        }
    }
}

fn load_or_default(path: &Path) -> Result<RouterConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(load_config(path)?)
    } else {
        eprintln!("{} not found, using defaults", path.display());
        Ok(RouterConfig::default())
    }
}

fn build_router(config: &RouterConfig) -> Result<Router, routekit::RouterError> {
    Router::builder()
        .configure(config)
        .handler("echo", vec![], echo)
        .handler("health", vec![], |_args, _ctx| Ok(Reply::ok(json!({ "status": "ok" }))))
        .build()
}

/// Reflects what the router extracted from the request.
fn echo(_args: &Args, ctx: &RequestContext) -> Result<Reply, HandlerError> {
    Ok(Reply::ok(json!({
        "method": ctx.method,
        "path": ctx.path,
        "params": ctx.params,
        "query": ctx.query,
        "user": ctx.user_identity(),
        "request_id": ctx.request_id,
    })))
}

fn print_routes(router: &Router) {
    let table = router.table();
    println!("{:<7} {:<40} {:<24} {:<24} MIDDLEWARE", "METHOD", "URI", "NAME", "HANDLER");
    for route in table.all() {
        println!(
            "{:<7} {:<40} {:<24} {:<24} {}",
            route.method(),
            route.uri(),
            route.name().unwrap_or("-"),
            route.handler(),
            route.middleware().join(",")
        );
    }
    println!("{} routes", table.len());
}

async fn serve(config_path: &Path, config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("routekit v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = Arc::new(build_router(&config)?);
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let sweep = router
        .rate_window()
        .run_cleanup_loop(Duration::from_secs(config.observability.rate_window_sweep_secs));

    // Hot reload: new route tables are built off to the side and swapped in
    let _watcher = if config_path.exists() {
        let (watcher, mut updates) = ConfigWatcher::new(config_path);
        let handle = watcher.run()?;
        let router = Arc::clone(&router);
        let stop = shutdown.signalled();
        tokio::spawn(async move {
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    update = updates.recv() => match update {
                        Some(new_config) => match router.reload(new_config.routes) {
                            Ok(routes) => tracing::info!(routes, "Routes reloaded"),
                            Err(e) => tracing::error!(error = %e, "Reload rejected, keeping current routes"),
                        },
                        None => break,
                    },
                }
            }
        });
        Some(handle)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        routes = router.table().len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Listening for connections"
    );

    HttpServer::new(Arc::clone(&router), &config)
        .run(listener, shutdown.signalled())
        .await?;

    sweep.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}
