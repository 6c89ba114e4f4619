// Connection handling module
// Accepts a single TCP connection and serves it with hyper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;

use crate::config::{AppState, ConnectionGuard};
use crate::handler;
use crate::http;
use crate::logger;

/// Accept a connection, enforcing the connection limit, and serve it in a task.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    let Some(guard) = state.try_acquire_connection() else {
        logger::log_warning(&format!(
            "Max connections reached: {}/{}. Connection from {peer_addr} rejected.",
            state.connection_count(),
            state.config.performance.max_connections.unwrap_or_default()
        ));
        drop(stream);
        return;
    };

    if state.access_log_enabled() {
        logger::log_connection_accepted(&peer_addr);
    }

    tokio::spawn(serve_connection(stream, peer_addr, Arc::clone(state), guard));
}

/// Serve one connection until the client closes it or shutdown completes it.
///
/// Timeouts apply per request, never to the connection as a whole: reading a
/// request head (including the idle wait before it on a keep-alive
/// connection) is bounded by `read_timeout`, producing the response by
/// `write_timeout`; zero disables either limit. On shutdown the connection
/// finishes its in-flight request and then closes instead of waiting for the
/// next keep-alive request.
async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    _guard: ConnectionGuard,
) {
    let io = TokioIo::new(stream);
    let perf = &state.config.performance;
    let write_timeout = (perf.write_timeout > 0).then_some(Duration::from_secs(perf.write_timeout));
    let read_timeout = (perf.read_timeout > 0).then_some(Duration::from_secs(perf.read_timeout));

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .keep_alive(perf.keep_alive_timeout > 0);

    let service_state = Arc::clone(&state);
    let service = service_fn(move |req| {
        let state = Arc::clone(&service_state);
        async move {
            let handled = handler::handle_request(req, state, peer_addr);
            let Some(limit) = write_timeout else {
                return handled.await;
            };
            match tokio::time::timeout(limit, handled).await {
                Ok(result) => result,
                Err(_) => {
                    logger::log_warning(&format!(
                        "Request from {peer_addr} timed out after {} seconds",
                        limit.as_secs()
                    ));
                    Ok(http::build_500_response())
                }
            }
        }
    });

    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    let served = tokio::select! {
        result = conn.as_mut() => result,
        () = state.shutdown_requested() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    match served {
        Ok(()) => {}
        Err(err) if err.is_timeout() => logger::log_warning(&format!(
            "Connection from {peer_addr} closed: no request head within {} seconds",
            perf.read_timeout
        )),
        Err(err) => logger::log_connection_error(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Read one response off a keep-alive connection and return its body
    async fn read_response<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> String {
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).await.unwrap();
        String::from_utf8(body).unwrap()
    }

    #[tokio::test]
    async fn test_keep_alive_outlives_request_timeouts() {
        let mut config = Config::load_from("/nonexistent/greeter/config").unwrap();
        config.logging.access_log = false;
        config.performance.read_timeout = 1;
        config.performance.write_timeout = 1;
        let state = Arc::new(AppState::new(config, crate::app::build_router().unwrap()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            accept_connection(stream, peer, &server_state);
        });

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut stream = BufReader::new(stream);
        // together the requests span well past both timeouts
        for round in 0..4 {
            stream
                .get_mut()
                .write_all(b"GET /name HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            assert_eq!(read_response(&mut stream).await, r#"{"name":"Roman"}"#, "round {round}");
            tokio::time::sleep(Duration::from_millis(600)).await;
        }
    }
}
