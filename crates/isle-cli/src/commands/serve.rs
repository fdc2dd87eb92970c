//! `isle serve` command implementation.
//!
//! Serves island bundles built on demand:
//!
//! ```text
//! Browser requests GET /_script?source=app/islands/counter&sha=abc123
//!   → canonicalize + cache lookup
//!   → allow-list check
//!   → compile (SWC: TSX → JS), rewriting imports
//!       bare     → https://esm.sh/<pkg>@<version>
//!       relative → /_script?source=<path>
//!   → serve as application/javascript
//! ```

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use isle_core::{ScriptQuery, ScriptService, ServeError, ServerConfig};
use miette::{IntoDiagnostic, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Server action.
#[derive(Debug, Clone)]
pub struct ServeAction {
    pub config: ServerConfig,
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

/// Run the server until Ctrl-C.
pub async fn run(action: ServeAction) -> Result<()> {
    let service = Arc::new(ScriptService::load(action.config).into_diagnostic()?);
    let endpoint = service.endpoint();
    let cache_policy = service.cache().policy();
    let app = router(service);

    let host_ip = if action.host == "localhost" {
        "127.0.0.1".to_string()
    } else {
        action.host.clone()
    };
    let addr: SocketAddr = format!("{}:{}", host_ip, action.port)
        .parse()
        .into_diagnostic()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;

    tracing::info!(%addr, endpoint = endpoint.path(), ?cache_policy, "listening");
    println!();
    println!("  Island server running at http://{}:{}", action.host, action.port);
    println!("  Scripts served from {}", endpoint.path());
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("server stopped");
    Ok(())
}

/// Routes: the script endpoint and a liveness probe.
pub fn router(service: Arc<ScriptService>) -> Router {
    let endpoint = service.endpoint();
    Router::new()
        .route(endpoint.path(), get(serve_script))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Serve a bundle at the script endpoint.
async fn serve_script(
    State(service): State<Arc<ScriptService>>,
    Query(query): Query<ScriptQuery>,
) -> Response {
    // Compilation is CPU-bound.
    let served = tokio::task::spawn_blocking(move || service.serve(&query)).await;

    match served {
        Ok(Ok(script)) => (
            [
                (header::CONTENT_TYPE, script.content_type),
                (header::CACHE_CONTROL, script.cache_control),
            ],
            script.body,
        )
            .into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(e) => {
            tracing::error!("bundle task failed: {e}");
            error_response(&ServeError::BuildFailed)
        }
    }
}

fn error_response(err: &ServeError) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}
