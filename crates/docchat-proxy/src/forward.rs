//! Prefix-match-and-forward handler.

use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use docchat_config::{ProxyRoute, ProxyTable};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, warn};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct ProxyState {
    table: ProxyTable,
    client: reqwest::Client,
    static_files: Option<ServeDir<ServeFile>>,
}

impl ProxyState {
    pub fn new(table: ProxyTable, static_dir: Option<&Path>) -> Result<Self, reqwest::Error> {
        // Redirects go back to the browser untouched.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        // Unknown paths fall back to index.html so client-side routes load.
        let static_files = static_dir.map(|dir| ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))));
        Ok(Self {
            table,
            client,
            static_files,
        })
    }

    pub fn table(&self) -> &ProxyTable {
        &self.table
    }
}

/// Forwards a request to the first matching route, or serves static files.
pub async fn forward(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let Some(route) = state.table.resolve(req.uri().path()) else {
        return serve_static(&state, req).await;
    };

    match send_upstream(&state.client, route, req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Upstream {} unreachable: {}", route.target, e);
            (StatusCode::BAD_GATEWAY, format!("proxy error: {}", e)).into_response()
        }
    }
}

async fn send_upstream(client: &reqwest::Client, route: &ProxyRoute, req: Request) -> Result<Response, reqwest::Error> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = route.upstream_uri(path_and_query);
    debug!("{} {} -> {}", parts.method, path_and_query, url);

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    if route.change_origin {
        if let Ok(host) = HeaderValue::from_str(route.target_authority()) {
            headers.insert(header::HOST, host);
        }
    }

    let mut upstream = client.request(parts.method, url).headers(headers);
    if body.size_hint().exact() != Some(0) {
        upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }
    let resp = upstream.send().await?;

    let status = resp.status();
    let mut out_headers = resp.headers().clone();
    strip_hop_by_hop(&mut out_headers);

    // Response bodies stream through so SSE answers arrive incrementally.
    let mut out = Response::new(Body::from_stream(resp.bytes_stream()));
    *out.status_mut() = status;
    *out.headers_mut() = out_headers;
    Ok(out)
}

async fn serve_static(state: &ProxyState, req: Request) -> Response {
    let Some(files) = state.static_files.clone() else {
        return (StatusCode::NOT_FOUND, "no proxy route").into_response();
    };
    match files.oneshot(req).await {
        Ok(resp) => resp.map(Body::new),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
