//! Client-side cache of the user's favorite movies.
//!
//! The store is the single answer to "is movie X a favorite" for every tab.
//! It is filled by a full replace from the backend and then mutated
//! optimistically: the local change lands first and the backend call follows.

use crate::backend::ApiClient;
use crate::models::{Movie, MovieId};
use anyhow::anyhow;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What happens to a local mutation when the backend call behind it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoritesPolicy {
    /// Spawn the backend call and keep the local change whatever happens.
    #[default]
    FireAndForget,
    /// Await the backend call and undo the local change if it failed.
    Reconcile,
}

impl FromStr for FavoritesPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fire-and-forget" | "fire_and_forget" | "optimistic" => Ok(Self::FireAndForget),
            "reconcile" => Ok(Self::Reconcile),
            other => Err(anyhow!(
                "Unknown favorites policy '{}' (expected fire-and-forget or reconcile)",
                other
            )),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("no session token, favorites not loaded")]
    MissingToken,
    #[error("favorites could not be fetched from the backend")]
    Unavailable,
}

#[derive(Debug, Clone, Default)]
pub struct FavoritesStore {
    movies: Vec<Movie>,
    revision: u64,
    policy: FavoritesPolicy,
}

impl FavoritesStore {
    pub fn new(policy: FavoritesPolicy) -> Self {
        Self {
            movies: Vec::new(),
            revision: 0,
            policy,
        }
    }

    pub fn policy(&self) -> FavoritesPolicy {
        self.policy
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn contains(&self, id: MovieId) -> bool {
        self.movies.iter().any(|m| m.id == id)
    }

    /// Bumped whenever the set actually changes; views compare it to know
    /// when membership must be recomputed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the whole set. Duplicate ids keep their first occurrence.
    pub fn replace(&mut self, movies: Vec<Movie>) {
        let mut seen = HashSet::with_capacity(movies.len());
        let deduped: Vec<Movie> = movies.into_iter().filter(|m| seen.insert(m.id)).collect();
        if deduped != self.movies {
            self.movies = deduped;
            self.bump();
        }
    }

    /// Appends unless the id is already present. Returns whether it was added.
    pub fn insert(&mut self, movie: Movie) -> bool {
        if self.contains(movie.id) {
            return false;
        }
        self.movies.push(movie);
        self.bump();
        true
    }

    /// Removes the entry with `id`, returning its former position and value.
    pub fn remove(&mut self, id: MovieId) -> Option<(usize, Movie)> {
        let index = self.movies.iter().position(|m| m.id == id)?;
        let movie = self.movies.remove(index);
        self.bump();
        Some((index, movie))
    }

    /// Puts a removed entry back near its old position, unless the id came back meanwhile.
    pub fn restore(&mut self, index: usize, movie: Movie) -> bool {
        if self.contains(movie.id) {
            return false;
        }
        let index = index.min(self.movies.len());
        self.movies.insert(index, movie);
        self.bump();
        true
    }

    pub fn clear(&mut self) {
        if !self.movies.is_empty() {
            self.movies.clear();
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Fetches the server list and replaces the local set with it. On failure
    /// the current set is left untouched.
    pub async fn load(&mut self, api: &ApiClient, token: &str) -> Result<usize, SyncError> {
        if token.is_empty() {
            return Err(SyncError::MissingToken);
        }
        match api.fetch_favorites(token).await {
            Some(movies) => {
                self.replace(movies);
                info!("Loaded {} favorites", self.movies.len());
                Ok(self.movies.len())
            }
            None => Err(SyncError::Unavailable),
        }
    }

    /// Optimistically marks `movie` as a favorite and tells the backend.
    /// Returns whether the movie is a favorite once the call settles.
    pub async fn add_favorite(&mut self, api: &ApiClient, token: &str, movie: Movie) -> bool {
        let id = movie.id;
        let inserted = self.insert(movie);
        if token.is_empty() {
            debug!("No session token, movie {} kept locally only", id);
            return true;
        }
        match self.policy {
            FavoritesPolicy::FireAndForget => {
                api.spawn_add_favorite(token, id);
                true
            }
            FavoritesPolicy::Reconcile => {
                if api.add_favorite(token, id).await || !inserted {
                    return true;
                }
                warn!("Rolling back local add of movie {}", id);
                self.remove(id);
                false
            }
        }
    }

    /// Optimistically drops `id` from the set and tells the backend.
    /// Returns whether the movie is absent once the call settles.
    pub async fn remove_favorite(&mut self, api: &ApiClient, token: &str, id: MovieId) -> bool {
        let removed = self.remove(id);
        if token.is_empty() {
            debug!("No session token, movie {} removed locally only", id);
            return true;
        }
        match self.policy {
            FavoritesPolicy::FireAndForget => {
                api.spawn_remove_favorite(token, id);
                true
            }
            FavoritesPolicy::Reconcile => {
                if api.remove_favorite(token, id).await {
                    return true;
                }
                match removed {
                    Some((index, movie)) => {
                        warn!("Rolling back local removal of movie {}", id);
                        self.restore(index, movie);
                        false
                    }
                    None => true,
                }
            }
        }
    }
}
