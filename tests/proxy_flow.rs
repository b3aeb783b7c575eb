use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Path, Query},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use moviedeck::app::{build_router, AppState, PER_IP_BURST, PER_IP_LIMIT};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn auth_of(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn proxy_app(backend_url: &str) -> Router {
    build_router(AppState::new(backend_url, Duration::from_secs(5)).unwrap())
}

async fn body_json(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn forwards_get_with_authorization_and_status() {
    let backend = Router::new().route(
        "/movies/favorite",
        get(|headers: HeaderMap| async move {
            Json(json!({
                "results": [{ "id": 1, "title": "Inception" }],
                "auth": auth_of(&headers),
            }))
        }),
    );
    let url = spawn_backend(backend).await;

    let res = proxy_app(&url)
        .oneshot(
            Request::builder()
                .uri("/api/backend-proxy/movies/favorite")
                .header(header::AUTHORIZATION, "Bearer abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"));
    let body = body_json(res).await;
    assert_eq!(body["auth"], "Bearer abc");
    assert_eq!(body["results"][0]["title"], "Inception");
}

#[tokio::test]
async fn forwards_post_body_and_path_params() {
    let seen: Arc<Mutex<Vec<(i64, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let backend = Router::new()
        .route(
            "/movies/favorite/:id",
            post(move |Path(id): Path<i64>, headers: HeaderMap| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push((id, auth_of(&headers)));
                    (StatusCode::CREATED, Json(json!({ "ok": true })))
                }
            }),
        )
        .route(
            "/login",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "token": format!("t-{}", body["username"].as_str().unwrap_or("")) }))
            }),
        );
    let url = spawn_backend(backend).await;
    let app = proxy_app(&url);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/backend-proxy/movies/favorite/27205")
                .header(header::AUTHORIZATION, "Bearer abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[(27205, "Bearer abc".to_string())]
    );

    let res = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/backend-proxy/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"username":"ana","password":"pw"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "token": "t-ana" }));
}

#[tokio::test]
async fn passes_backend_errors_through() {
    let backend = Router::new().route(
        "/createUser",
        post(|| async { (StatusCode::CONFLICT, Json(json!({ "error": "exists" }))) }),
    );
    let url = spawn_backend(backend).await;

    let res = proxy_app(&url)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/backend-proxy/createUser")
                .body(Body::from(r#"{"username":"ana","password":"pw"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await, json!({ "error": "exists" }));
}

#[tokio::test]
async fn keeps_query_and_escaped_segments() {
    let backend = Router::new().route(
        "/movies/same_genres/:title",
        get(
            |Path(title): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({ "title": title, "page": q.get("page") }))
            },
        ),
    );
    let url = spawn_backend(backend).await;

    let res = proxy_app(&url)
        .oneshot(
            Request::builder()
                .uri("/api/backend-proxy/movies/same_genres/Alien%20Resurrection?page=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await,
        json!({ "title": "Alien Resurrection", "page": "2" })
    );
}

#[tokio::test]
async fn unreachable_backend_yields_500_json() {
    let res = proxy_app("http://127.0.0.1:1")
        .oneshot(
            Request::builder()
                .uri("/api/backend-proxy/movies/most_popular/20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Failed to fetch from backend");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn health_is_served_locally() {
    let res = proxy_app("http://127.0.0.1:1")
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

fn from_peer(uri: &str, peer: &str) -> Request<Body> {
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

#[tokio::test]
async fn each_peer_gets_its_own_rate_budget() {
    let backend = Router::new().route("/ping", get(|| async { "pong" }));
    let url = spawn_backend(backend).await;
    let app = proxy_app(&url);

    // Keep the whole run inside one rate-limit minute.
    let second = chrono::Utc::now().timestamp() % 60;
    if second > 50 {
        tokio::time::sleep(Duration::from_secs((61 - second) as u64)).await;
    }

    for _ in 0..(PER_IP_LIMIT + PER_IP_BURST) {
        let res = app
            .clone()
            .oneshot(from_peer("/api/backend-proxy/ping", "10.1.1.1:40000"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app
        .clone()
        .oneshot(from_peer("/api/backend-proxy/ping", "10.1.1.1:40001"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let res = app
        .oneshot(from_peer("/api/backend-proxy/ping", "10.2.2.2:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_authorization_is_forwarded() {
    let backend = Router::new().route(
        "/whoami",
        get(|headers: HeaderMap| async move {
            Json(json!({
                "auth": auth_of(&headers),
                "has_cookie": headers.contains_key(header::COOKIE),
            }))
        }),
    );
    let url = spawn_backend(backend).await;

    let res = proxy_app(&url)
        .oneshot(
            Request::builder()
                .uri("/api/backend-proxy/whoami")
                .header(header::AUTHORIZATION, "Bearer abc")
                .header(header::COOKIE, "session=xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        body_json(res).await,
        json!({ "auth": "Bearer abc", "has_cookie": false })
    );
}
