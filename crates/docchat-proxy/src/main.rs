mod forward;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use docchat_config::ProxyConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use forward::ProxyState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = ProxyConfig::from_env().context("invalid proxy configuration")?;
    let state = Arc::new(
        ProxyState::new(config.table, config.static_dir.as_deref()).context("failed to build upstream client")?,
    );

    info!("Proxy table ({} routes):", state.table().len());
    for route in state.table().routes() {
        info!("  - {}", route);
    }
    for (earlier, later) in state.table().shadowed() {
        warn!("Route {} is unreachable: {} is declared first and matches it", later, earlier);
    }
    match &config.static_dir {
        Some(dir) => info!("Serving static files from {}", dir.display()),
        None => info!("No static directory configured; unmatched paths return 404"),
    }

    let app = app(state);

    info!("Starting dev proxy on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: Arc<ProxyState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!("proxy", method = %req.method(), uri = %req.uri())
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "proxied"
            );
        });

    Router::new()
        .fallback(forward::forward)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
