// Server loop module
// Accepts connections until shutdown, then drains open connections

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the accept loop on `listener` until shutdown is requested.
///
/// After shutdown the listener is closed and open connections get up to
/// `performance.shutdown_grace_period` seconds to finish.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>) {
    let shutdown = state.shutdown_requested();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = &mut shutdown => break,
        }
    }

    drop(listener);
    logger::log_shutdown_started(state.connection_count());

    let grace = Duration::from_secs(state.config.performance.shutdown_grace_period);
    let remaining = drain_connections(&state, grace).await;
    logger::log_shutdown_finished(remaining);
}

/// Wait until no connections are open or `grace` elapses; returns the count left
async fn drain_connections(state: &AppState, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let active = state.connection_count();
        if active == 0 {
            return 0;
        }

        tokio::select! {
            () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            () = tokio::time::sleep_until(deadline) => return state.connection_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routing::Router;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_state() -> Arc<AppState> {
        let mut config = Config::load_from("/nonexistent/greeter/config").unwrap();
        config.logging.access_log = false;
        config.performance.shutdown_grace_period = 1;
        Arc::new(AppState::new(config, crate::app::build_router().unwrap()))
    }

    #[tokio::test]
    async fn test_drain_returns_immediately_when_idle() {
        let mut config = Config::load_from("/nonexistent/greeter/config").unwrap();
        config.logging.access_log = false;
        let state = AppState::new(config, Router::new());
        assert_eq!(drain_connections(&state, Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let state = test_state();
        let _guard = state.try_acquire_connection().unwrap();
        let remaining = drain_connections(&state, Duration::from_millis(120)).await;
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_serves_requests_and_stops_on_shutdown() {
        let state = test_state();
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(start_server_loop(listener, Arc::clone(&state)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /name/Alice HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8(raw).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK"), "{text}");
        assert!(text.ends_with(r#"{"name":"Alice"}"#), "{text}");

        state.request_shutdown();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server loop did not stop")
            .unwrap();
        assert_eq!(state.connection_count(), 0);
    }
}
