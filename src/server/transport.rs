//! Listener setup and graceful shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handlers::router;
use crate::agent::Orchestrator;

/// Serves the HTTP API on `host:port` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(orchestrator: Arc<Orchestrator>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        trigger.cancel();
    });

    serve_listener(orchestrator, listener, shutdown).await
}

/// Serves the HTTP API on an already bound listener until `shutdown` fires.
///
/// In-flight requests are allowed to finish after cancellation.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_listener(
    orchestrator: Arc<Orchestrator>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "hoprag listening on http://{addr}");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::test_support::{MemoryRetriever, ScriptedProvider};
    use crate::agent::{PromptSet, RagConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn request(addr: std::net::SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr)
            .await
            .unwrap_or_else(|e| panic!("connect: {e}"));
        stream
            .write_all(raw.as_bytes())
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .unwrap_or_else(|e| panic!("read: {e}"));
        response
    }

    #[tokio::test]
    async fn test_serves_until_cancelled() {
        let config = RagConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|e| panic!("config: {e}"));
        let orchestrator = Arc::new(
            Orchestrator::new(
                Arc::new(ScriptedProvider::new(Vec::new())),
                Arc::new(MemoryRetriever::new()),
                config,
            )
            .with_prompts(PromptSet::defaults()),
        );
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("bind: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("addr: {e}"));
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_listener(orchestrator, listener, shutdown.clone()));

        let health = request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.contains("\"status\":\"ok\""));

        let body = r#"{"query":""}"#;
        let bad = request(
            addr,
            &format!(
                "POST /chat HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            ),
        )
        .await;
        assert!(bad.starts_with("HTTP/1.1 400"));
        assert!(bad.contains("\"detail\""));

        shutdown.cancel();
        let result = server.await.unwrap_or_else(|e| panic!("join: {e}"));
        assert!(result.is_ok());
    }
}
