use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{BackendApi, BackendError, BackendResult, RelatedKind};
use crate::config::Config;
use crate::models::{Credentials, LoginToken, Movie, MovieId, MovieList};

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let user_agent = format!("moviedeck/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.backend_url.clone(), config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if token.is_empty() {
            builder
        } else {
            builder.bearer_auth(token)
        }
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let res = builder.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(res)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> BackendResult<T> {
        let res = self.send(self.request(Method::GET, path, token)).await?;
        let text = res.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_movies(&self, path: &str, token: &str) -> BackendResult<Vec<Movie>> {
        let list: MovieList = self.get_json(path, token).await?;
        Ok(list.into_movies())
    }
}

fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[async_trait]
impl BackendApi for BackendClient {
    async fn login(&self, username: &str, password: &str) -> BackendResult<LoginToken> {
        let body = Credentials { username, password };
        let res = self
            .send(self.request(Method::POST, "/login", "").json(&body))
            .await?;
        let text = res.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn create_user(&self, username: &str, password: &str) -> BackendResult<()> {
        let body = Credentials { username, password };
        self.send(self.request(Method::POST, "/createUser", "").json(&body))
            .await?;
        Ok(())
    }

    async fn most_popular(&self, token: &str, count: u32) -> BackendResult<Vec<Movie>> {
        self.get_movies(&format!("/movies/most_popular/{count}"), token)
            .await
    }

    async fn favorites(&self, token: &str) -> BackendResult<Vec<Movie>> {
        self.get_movies("/movies/favorite", token).await
    }

    async fn add_favorite(&self, token: &str, id: MovieId) -> BackendResult<()> {
        let path = format!("/movies/favorite/{}", segment(&id.to_string()));
        self.send(self.request(Method::POST, &path, token)).await?;
        Ok(())
    }

    async fn remove_favorite(&self, token: &str, id: MovieId) -> BackendResult<()> {
        let path = format!("/movies/favorite/{}", segment(&id.to_string()));
        self.send(self.request(Method::DELETE, &path, token)).await?;
        Ok(())
    }

    async fn search(&self, token: &str, query: &str) -> BackendResult<Vec<Movie>> {
        self.get_movies(&format!("/movies/{}", segment(query)), token)
            .await
    }

    async fn related(
        &self,
        token: &str,
        title: &str,
        kind: RelatedKind,
    ) -> BackendResult<Vec<Movie>> {
        let path = format!("/movies/{}/{}", kind.path_segment(), segment(title));
        let res = self.send(self.request(Method::GET, &path, token)).await?;
        let text = res.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, Duration::from_secs(5)).unwrap()
    }

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn login_posts_credentials_and_reads_token() {
        let router = Router::new().route(
            "/login",
            post(|Json(body): Json<Value>| async move {
                if body == json!({ "username": "ana", "password": "pw" }) {
                    (StatusCode::OK, Json(json!({ "token": "abc" })))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad" })))
                }
            }),
        );
        let base = spawn_backend(router).await;
        let backend = client(&base);

        let token = backend.login("ana", "pw").await.unwrap();
        assert_eq!(token.token, "abc");

        let err = backend.login("ana", "wrong").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn create_user_maps_conflict() {
        let router = Router::new().route(
            "/createUser",
            post(|| async { (StatusCode::CONFLICT, Json(json!({ "error": "exists" }))) }),
        );
        let base = spawn_backend(router).await;
        let err = client(&base).create_user("ana", "pw").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn attaches_bearer_and_unwraps_results_envelope() {
        let router = Router::new().route(
            "/movies/favorite",
            get(|headers: HeaderMap| async move {
                assert_eq!(bearer(&headers), "Bearer abc");
                Json(json!({ "results": [{ "id": 1, "title": "Inception" }] }))
            }),
        );
        let base = spawn_backend(router).await;
        let movies = client(&base).favorites("abc").await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, 1);
    }

    #[tokio::test]
    async fn escapes_path_segments() {
        let router = Router::new().route(
            "/movies/same_genres/:title",
            get(|Path(title): Path<String>| async move {
                Json(json!([{ "id": 9, "title": title }]))
            }),
        );
        let base = spawn_backend(router).await;
        let movies = client(&base)
            .related("abc", "Alien/Aliens 2", RelatedKind::SameGenre)
            .await
            .unwrap();
        assert_eq!(movies[0].title, "Alien/Aliens 2");
    }

    #[tokio::test]
    async fn related_rejects_non_array_body() {
        let router = Router::new().route(
            "/movies/similar_runtime/:title",
            get(|| async { Json(json!({ "detail": "not found" })) }),
        );
        let base = spawn_backend(router).await;
        let err = client(&base)
            .related("abc", "Heat", RelatedKind::SimilarRuntime)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(&format!("http://{}", addr))
            .most_popular("abc", 20)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }
}
