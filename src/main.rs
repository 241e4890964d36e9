use std::sync::Arc;
use tokio::sync::Notify;

mod config;
mod error;
mod handler;
mod http;
mod logger;
mod server;
mod uploads;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Worker threads default to the number of CPU cores
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(config::AppState::new(cfg)?);

    if !state.resolver.root().as_path().is_dir() {
        logger::log_warning(&format!(
            "Upload root {} is not a directory yet; requests will return 404 until it exists",
            state.resolver.root()
        ));
    }

    let listener = server::bind_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    let still_open = server::run_server(listener, state, shutdown).await;
    if still_open > 0 {
        logger::log_warning(&format!(
            "Grace period elapsed with {still_open} connection(s) still open"
        ));
    }
    logger::log_info("Server stopped");
    Ok(())
}
