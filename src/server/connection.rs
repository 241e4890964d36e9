// Connection handling module
// Admits TCP connections and serves each one on its own task

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Holds one slot of the active connection counter, released on drop
struct ConnectionSlot {
    counter: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    /// Take a slot unless `limit` slots are already taken
    fn acquire(counter: &Arc<AtomicUsize>, limit: Option<u64>) -> Result<Self, usize> {
        // Increment first, then check, so concurrent accepts cannot both pass
        let prev = counter.fetch_add(1, Ordering::SeqCst);
        let max = limit.map(|m| usize::try_from(m).unwrap_or(usize::MAX));
        if max.is_some_and(|max| prev >= max) {
            counter.fetch_sub(1, Ordering::SeqCst);
            return Err(prev);
        }
        Ok(Self {
            counter: Arc::clone(counter),
        })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept a connection, enforcing `max_connections`, and spawn its task.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `active` - Active connection counter
/// * `closing` - Flips to `true` once the server starts shutting down
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    active: &Arc<AtomicUsize>,
    closing: &watch::Receiver<bool>,
) {
    let limit = state.config.performance.max_connections;
    let slot = match ConnectionSlot::acquire(active, limit) {
        Ok(slot) => slot,
        Err(open) => {
            logger::log_warning(&format!(
                "Max connections reached: {open}/{}. Connection from {peer_addr} rejected.",
                limit.unwrap_or_default()
            ));
            drop(stream);
            return;
        }
    };

    logger::log_connection_accepted(&peer_addr);
    tokio::spawn(serve_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        closing.clone(),
        slot,
    ));
}

/// Serve HTTP/1.1 on one connection until it closes or times out.
///
/// A client that disconnects mid-request drops the in-flight read with it.
/// When `closing` flips, the connection finishes its current request and
/// closes; an idle keep-alive connection closes right away.
async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    mut closing: watch::Receiver<bool>,
    _slot: ConnectionSlot,
) {
    let io = TokioIo::new(stream);
    let perf = &state.config.performance;
    let timeout = Duration::from_secs(perf.read_timeout.max(perf.write_timeout));

    let mut builder = http1::Builder::new();
    builder.keep_alive(perf.keep_alive_timeout > 0);

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), peer_addr)),
    );

    let served = async {
        tokio::pin!(conn);
        tokio::select! {
            result = conn.as_mut() => result,
            _ = closing.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    };

    match tokio::time::timeout(timeout, served).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => logger::log_connection_error(&err),
        Err(_) => logger::log_warning(&format!(
            "Connection from {peer_addr} timed out after {} seconds",
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_limit_and_release() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = ConnectionSlot::acquire(&counter, Some(2)).unwrap();
        let second = ConnectionSlot::acquire(&counter, Some(2)).unwrap();
        assert!(matches!(ConnectionSlot::acquire(&counter, Some(2)), Err(2)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        drop(first);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let _third = ConnectionSlot::acquire(&counter, Some(2)).unwrap();
        drop(second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unlimited_slots() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slots: Vec<_> = (0..100)
            .map(|_| ConnectionSlot::acquire(&counter, None).unwrap())
            .collect();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        drop(slots);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
