//! Backend REST surface: the transport seam, its reqwest implementation and
//! the degrading facade the views talk to.

use crate::models::{LoginToken, Movie, MovieId};
use async_trait::async_trait;
use reqwest::StatusCode;

mod api;
mod client;

pub use api::{ApiClient, RelatedMovies, CONFLICT_MESSAGE, CONNECT_MESSAGE, UNEXPECTED_MESSAGE};
pub use client::BackendClient;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelatedKind {
    SameGenre,
    SimilarRuntime,
}

impl RelatedKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            RelatedKind::SameGenre => "same_genres",
            RelatedKind::SimilarRuntime => "similar_runtime",
        }
    }
}

/// Raw calls against the backend. Tokens are attached as bearer credentials
/// when non-empty.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> BackendResult<LoginToken>;
    async fn create_user(&self, username: &str, password: &str) -> BackendResult<()>;
    async fn most_popular(&self, token: &str, count: u32) -> BackendResult<Vec<Movie>>;
    async fn favorites(&self, token: &str) -> BackendResult<Vec<Movie>>;
    async fn add_favorite(&self, token: &str, id: MovieId) -> BackendResult<()>;
    async fn remove_favorite(&self, token: &str, id: MovieId) -> BackendResult<()>;
    async fn search(&self, token: &str, query: &str) -> BackendResult<Vec<Movie>>;
    async fn related(&self, token: &str, title: &str, kind: RelatedKind)
        -> BackendResult<Vec<Movie>>;
}
