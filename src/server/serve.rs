// Server loop module
// Accepts connections until shutdown, then drains open connections

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How often the drain phase re-checks the open connection count
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept connections until `shutdown` is notified.
///
/// After the signal the listener is closed, open connections are told to
/// close once their current request is answered, and they get up to
/// `shutdown_grace_period` seconds to finish. Returns the number of
/// connections still open when the grace period ran out.
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> usize {
    let active = Arc::new(AtomicUsize::new(0));
    let (closing_tx, closing_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active, &closing_rx);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => break,
        }
    }

    drop(listener);
    logger::log_shutdown(active.load(Ordering::SeqCst));
    closing_tx.send_replace(true);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace_period);
    drain_connections(&active, grace).await
}

/// Wait until no connection is open or `grace` elapses
async fn drain_connections(active: &AtomicUsize, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let open = active.load(Ordering::SeqCst);
        if open == 0 || tokio::time::Instant::now() >= deadline {
            return open;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::bind_listener;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_drain_returns_immediately_when_idle() {
        let active = AtomicUsize::new(0);
        assert_eq!(drain_connections(&active, Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace_period() {
        let active = AtomicUsize::new(3);
        assert_eq!(drain_connections(&active, Duration::from_millis(120)).await, 3);
    }

    #[tokio::test]
    async fn test_serves_over_tcp_and_shuts_down() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("manual.txt"), b"operate with care").unwrap();

        let mut config = Config::load_from("definitely-missing-config-file").unwrap();
        config.uploads.root = tmp.path().to_str().unwrap().to_string();
        config.logging.access_log = false;
        config.performance.shutdown_grace_period = 1;
        let state = Arc::new(AppState::new(config).unwrap());

        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(run_server(listener, state, Arc::clone(&shutdown)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /uploads/manual.txt HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
        assert!(raw.contains("cache-control: public, max-age=31536000, immutable"));
        assert!(raw.contains("content-type: text/plain; charset=utf-8"));
        assert!(raw.ends_with("operate with care"));

        shutdown.notify_one();
        assert_eq!(server.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_closes_on_shutdown() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("manual.txt"), b"operate with care").unwrap();

        let mut config = Config::load_from("definitely-missing-config-file").unwrap();
        config.uploads.root = tmp.path().to_str().unwrap().to_string();
        config.logging.access_log = false;
        config.performance.shutdown_grace_period = 5;
        let state = Arc::new(AppState::new(config).unwrap());

        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(run_server(listener, state, Arc::clone(&shutdown)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /uploads/manual.txt HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !raw.ends_with(b"operate with care") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before the response arrived");
            raw.extend_from_slice(&buf[..n]);
        }

        let started = tokio::time::Instant::now();
        shutdown.notify_one();
        let still_open = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("shutdown waited on an idle connection")
            .unwrap();
        assert_eq!(still_open, 0);
        assert!(started.elapsed() < Duration::from_secs(2));

        // The server side hung up on the idle connection
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }
}
