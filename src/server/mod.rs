// Server module entry point
// Listener setup, connection handling, accept loop and signals

pub mod connection;
pub mod listener;
pub mod serve;
pub mod signal;

pub use listener::bind_listener;
pub use serve::run_server;
pub use signal::start_signal_handler;
