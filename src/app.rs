use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

pub const PROXY_PREFIX: &str = "/api/backend-proxy";

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap
pub const PER_IP_LIMIT: u32 = 300; // per minute
pub const PER_IP_BURST: u32 = 30;
const GLOBAL_LIMIT: u32 = 3000; // per minute
const GLOBAL_BURST: u32 = 300;
const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub backend_url: String,
    pub rate_limits: Arc<Mutex<HashMap<String, WindowCounter>>>,
    pub global_limit: Arc<Mutex<WindowCounter>>,
}

#[derive(Clone, Debug)]
pub struct WindowCounter {
    pub window: u64,
    pub count: u32,
}

impl AppState {
    pub fn new(backend_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("Failed to build proxy HTTP client")?;
        Ok(Self {
            client,
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            rate_limits: Arc::new(Mutex::new(HashMap::new())),
            global_limit: Arc::new(Mutex::new(WindowCounter {
                window: 0,
                count: 0,
            })),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.backend_url.clone(), config.http_timeout)
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    info!("Forwarding {} to {}", PROXY_PREFIX, state.backend_url);

    let app = build_router(state);

    info!("Listening on {}", config.proxy_bind);
    let listener = tokio::net::TcpListener::bind(config.proxy_bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.proxy_bind))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(PROXY_PREFIX, any(proxy))
        .route(&format!("{PROXY_PREFIX}/*path"), any(proxy))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Maps `/api/backend-proxy/<rest>?<query>` to `<backend>/<rest>?<query>`,
/// keeping percent-escapes as the client sent them.
fn backend_target(backend_url: &str, uri: &Uri) -> String {
    let rest = uri
        .path()
        .strip_prefix(PROXY_PREFIX)
        .unwrap_or_else(|| uri.path());
    let rest = if rest.is_empty() { "/" } else { rest };
    match uri.query() {
        Some(q) => format!("{backend_url}{rest}?{q}"),
        None => format!("{backend_url}{rest}"),
    }
}

async fn proxy(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ip = extract_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    if !check_rate_limit(&state, &ip).await || !check_global_rate_limit(&state).await {
        warn!("Rate limit exceeded for {}", ip);
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }

    let target = backend_target(&state.backend_url, &uri);
    debug!("handling request to: {} {}", method, target);

    let mut request = state
        .client
        .request(method.clone(), &target)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        request = request.header(header::AUTHORIZATION, value.clone());
    }
    if method != Method::GET && method != Method::HEAD && !body.is_empty() {
        request = request.body(body);
    }

    let backend_res = match request.send().await {
        Ok(res) => res,
        Err(e) => {
            error!("Proxy error for {}: {}", target, e);
            return proxy_failure(e.to_string());
        }
    };

    let status = backend_res.status();
    let content_type = backend_res.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = match backend_res.bytes().await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read backend response from {}: {}", target, e);
            return proxy_failure(e.to_string());
        }
    };
    if !status.is_success() {
        info!("Backend answered {} for {} {}", status, method, target);
    }

    let mut response = (status, bytes).into_response();
    if let Some(ct) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    response
}

fn proxy_failure(details: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Failed to fetch from backend",
            "details": details,
        })),
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}

/// Client key for rate limiting: the first forwarded address when a reverse
/// proxy set one, otherwise the connection's peer.
fn extract_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-real-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn check_rate_limit(state: &AppState, ip: &str) -> bool {
    let window = (Utc::now().timestamp() / 60) as u64;
    let mut guards = state.rate_limits.lock().await;
    if guards.len() > MAX_RATE_LIMIT_ENTRIES {
        guards.retain(|_, v| v.window == window);
    }
    let entry = guards
        .entry(ip.to_string())
        .or_insert(WindowCounter { window, count: 0 });
    if entry.window != window {
        entry.window = window;
        entry.count = 0;
    }
    if entry.count >= PER_IP_LIMIT + PER_IP_BURST {
        return false;
    }
    entry.count += 1;
    true
}

async fn check_global_rate_limit(state: &AppState) -> bool {
    let window = (Utc::now().timestamp() / 60) as u64;
    let mut guard = state.global_limit.lock().await;
    if guard.window != window {
        guard.window = window;
        guard.count = 0;
    }
    if guard.count >= GLOBAL_LIMIT + GLOBAL_BURST {
        return false;
    }
    guard.count += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_proxy_paths_to_backend() {
        let uri: Uri = "/api/backend-proxy/movies/same_genres/Alien%2FAliens?x=1"
            .parse()
            .unwrap();
        assert_eq!(
            backend_target("http://app:5000", &uri),
            "http://app:5000/movies/same_genres/Alien%2FAliens?x=1"
        );
        let root: Uri = "/api/backend-proxy".parse().unwrap();
        assert_eq!(backend_target("http://app:5000", &root), "http://app:5000/");
    }

    #[test]
    fn extracts_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        let peer: SocketAddr = "192.168.1.7:51234".parse().unwrap();
        assert_eq!(extract_ip(&headers, Some(peer)), "10.0.0.1");
        assert_eq!(extract_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let peer: SocketAddr = "192.168.1.7:51234".parse().unwrap();
        assert_eq!(extract_ip(&HeaderMap::new(), Some(peer)), "192.168.1.7");
    }

    #[tokio::test]
    async fn per_ip_limit_trips_after_burst() {
        let state = AppState::new("http://app:5000", Duration::from_secs(1)).unwrap();
        for _ in 0..(PER_IP_LIMIT + PER_IP_BURST) {
            assert!(check_rate_limit(&state, "1.2.3.4").await);
        }
        assert!(!check_rate_limit(&state, "1.2.3.4").await);
        assert!(check_rate_limit(&state, "5.6.7.8").await);
    }
}
