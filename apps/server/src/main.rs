mod args;
mod config;
mod dirs;

use std::io;
use std::net::{IpAddr, SocketAddr};

use app_api::AppContext;
use http_api::HttpState;
use leaderboard_app::{AppPaths, AppState, TracingConfig, ensure_app_data_dir, init_tracing};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = args::parse_args().map_err(|err| {
        eprintln!("{err}");
        args::print_help();
        io::Error::new(io::ErrorKind::InvalidInput, "invalid arguments")
    })?;

    init_tracing(&TracingConfig { debug: args.debug }).map_err(io::Error::other)?;

    let data_dir = dirs::resolve_data_dir(args.data_dir.clone()).map_err(io::Error::other)?;
    let paths = AppPaths::new(data_dir);
    ensure_app_data_dir(&paths).map_err(io::Error::other)?;

    let config_file = args.config.clone().unwrap_or_else(|| paths.config_path.clone());
    let config = config::load_or_create(&config_file).map_err(io::Error::other)?;
    if config.created {
        info!(file = %config.file.display(), "created default config");
    }
    let port = args.port.unwrap_or(config.config.port);
    let host: IpAddr = config
        .config
        .host
        .parse()
        .map_err(|_| io::Error::other(format!("invalid host {}", config.config.host)))?;

    let app_state = AppState::new(paths.db_path.clone(), config.config.engine);
    app_state
        .initialize()
        .map_err(|err| io::Error::other(format!("failed to initialize database: {}", err)))?;

    let scheduler = app_state.scheduler();
    scheduler.start();

    let context = AppContext {
        app_state,
        scheduler: scheduler.clone(),
    };
    let router = http_api::router(HttpState::new(context));

    let (listener, actual_port, used_fallback) = bind_port(host, port).await?;
    if used_fallback {
        warn!(port, actual_port, "configured port unavailable, using fallback");
    }

    println!("Leaderboard server is running at http://{host}:{actual_port}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("http server stopped, draining refreshes");
    scheduler.shutdown().await;
    Ok(())
}

async fn bind_port(
    host: IpAddr,
    port: u16,
) -> Result<(tokio::net::TcpListener, u16, bool), io::Error> {
    if port == 0 {
        let listener = tokio::net::TcpListener::bind(SocketAddr::new(host, 0)).await?;
        let actual_port = listener.local_addr()?.port();
        return Ok((listener, actual_port, false));
    }

    match tokio::net::TcpListener::bind(SocketAddr::new(host, port)).await {
        Ok(listener) => Ok((listener, port, false)),
        Err(_) => {
            let listener = tokio::net::TcpListener::bind(SocketAddr::new(host, 0)).await?;
            let actual_port = listener.local_addr()?.port();
            Ok((listener, actual_port, true))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
