use std::sync::Arc;

mod app;
mod config;
mod handler;
mod http;
mod logger;
mod routing;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;

    logger::init(&cfg)?;

    // Build the Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("[CONFIG] Using {workers} worker threads"));
    } else {
        logger::log_info("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    // All routes are registered before the router is shared
    let router = app::build_router()?;
    let listener = server::create_reusable_listener(addr)?;

    logger::log_server_start(&addr, &cfg, &router);
    logger::log_info(&format!(
        "[CONFIG] Max body size: {} bytes, max connections: {:?}",
        cfg.http.max_body_size, cfg.performance.max_connections
    ));

    let state = Arc::new(config::AppState::new(cfg, router));
    server::start_signal_handler(Arc::clone(&state))?;

    server::start_server_loop(listener, state).await;
    logger::log_info("Server stopped");
    Ok(())
}
