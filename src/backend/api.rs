use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BackendApi, RelatedKind};
use crate::models::{AccountOutcome, LoginToken, Movie, MovieId, SearchOption};

pub const CONFLICT_MESSAGE: &str = "UserName exists already";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";
pub const CONNECT_MESSAGE: &str = "Failed to connect to backend.";

/// Facade over a [`BackendApi`] that never lets an error past it: failures
/// are logged and come back as `None`, an empty list or `false`.
#[derive(Clone)]
pub struct ApiClient {
    backend: Arc<dyn BackendApi>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedMovies {
    pub same_genre: Vec<Movie>,
    pub similar_runtime: Vec<Movie>,
}

impl ApiClient {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self { backend }
    }

    pub async fn login(&self, username: &str, password: &str) -> Option<LoginToken> {
        match self.backend.login(username, password).await {
            Ok(token) => {
                info!("Logged in as '{}'", username);
                Some(token)
            }
            Err(e) => {
                warn!("Login failed for '{}': {}", username, e);
                None
            }
        }
    }

    pub async fn create_account(&self, username: &str, password: &str) -> AccountOutcome {
        match self.backend.create_user(username, password).await {
            Ok(()) => {
                info!("Created account '{}'", username);
                AccountOutcome::created()
            }
            Err(e) if e.is_conflict() => {
                warn!("Account '{}' already exists", username);
                AccountOutcome::failed(CONFLICT_MESSAGE)
            }
            Err(e) if e.status().is_some() => {
                warn!("Account creation failed for '{}': {}", username, e);
                AccountOutcome::failed(UNEXPECTED_MESSAGE)
            }
            Err(e) => {
                warn!("Account creation failed for '{}': {}", username, e);
                AccountOutcome::failed(CONNECT_MESSAGE)
            }
        }
    }

    pub async fn fetch_popular(&self, token: &str, count: u32) -> Option<Vec<Movie>> {
        match self.backend.most_popular(token, count).await {
            Ok(movies) => Some(movies),
            Err(e) => {
                warn!("Failed to fetch most popular movies: {}", e);
                None
            }
        }
    }

    pub async fn fetch_favorites(&self, token: &str) -> Option<Vec<Movie>> {
        match self.backend.favorites(token).await {
            Ok(movies) => {
                debug!("Fetched {} favorite movies", movies.len());
                Some(movies)
            }
            Err(e) => {
                warn!("Failed to fetch favorite movies: {}", e);
                None
            }
        }
    }

    pub async fn add_favorite(&self, token: &str, id: MovieId) -> bool {
        match self.backend.add_favorite(token, id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to add movie {} to favorites: {}", id, e);
                false
            }
        }
    }

    pub async fn remove_favorite(&self, token: &str, id: MovieId) -> bool {
        match self.backend.remove_favorite(token, id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove movie {} from favorites: {}", id, e);
                false
            }
        }
    }

    /// Fires the add call on its own task. The handle is only useful to tests.
    pub fn spawn_add_favorite(&self, token: &str, id: MovieId) -> JoinHandle<bool> {
        let api = self.clone();
        let token = token.to_string();
        tokio::spawn(async move { api.add_favorite(&token, id).await })
    }

    pub fn spawn_remove_favorite(&self, token: &str, id: MovieId) -> JoinHandle<bool> {
        let api = self.clone();
        let token = token.to_string();
        tokio::spawn(async move { api.remove_favorite(&token, id).await })
    }

    /// Blank queries short-circuit without touching the network.
    pub async fn search_movies(&self, token: &str, query: &str) -> Vec<SearchOption> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.backend.search(token, query).await {
            Ok(movies) => movies.iter().map(SearchOption::from).collect(),
            Err(e) => {
                warn!("Failed to search movies for '{}': {}", query, e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_related(&self, token: &str, title: &str, kind: RelatedKind) -> Vec<Movie> {
        match self.backend.related(token, title, kind).await {
            Ok(movies) => movies,
            Err(e) => {
                warn!(
                    "Failed to fetch {} movies for '{}': {}",
                    kind.path_segment(),
                    title,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Both relations concurrently; one failing leaves the other intact.
    pub async fn fetch_related_both(&self, token: &str, title: &str) -> RelatedMovies {
        let (same_genre, similar_runtime) = tokio::join!(
            self.fetch_related(token, title, RelatedKind::SameGenre),
            self.fetch_related(token, title, RelatedKind::SimilarRuntime),
        );
        RelatedMovies {
            same_genre,
            similar_runtime,
        }
    }
}
