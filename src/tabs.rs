//! The three screens of a logged-in session. Each tab owns its list views;
//! favorites live in the session's store and are passed in.

use crate::backend::{ApiClient, RelatedMovies};
use crate::chart;
use crate::favorites::{FavoritesStore, SyncError};
use crate::list_view::{Affordance, ListAction, ListView};
use crate::models::{MovieId, SearchOption};
use crate::session::SessionContext;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Upper bound of the popular tab's length selector.
pub const MAX_POPULAR_LENGTH: usize = 20;
pub const RELATED_VIEWPORT_HEIGHT: u32 = 200;

pub struct PopularTab {
    list: ListView,
    count: u32,
    selected_length: usize,
}

impl PopularTab {
    pub fn new(count: u32) -> Self {
        Self {
            list: ListView::new(ListAction::AddTo).with_length(1),
            count,
            selected_length: 1,
        }
    }

    pub fn list(&self) -> &ListView {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListView {
        &mut self.list
    }

    pub fn selected_length(&self) -> usize {
        self.selected_length
    }

    pub fn set_length(&mut self, length: usize) {
        self.selected_length = length.clamp(1, MAX_POPULAR_LENGTH);
        self.list.set_length(Some(self.selected_length));
    }

    /// Loads the popular list. Does nothing without a token; a failed fetch
    /// keeps whatever was shown before.
    pub async fn load(&mut self, api: &ApiClient, ctx: &SessionContext) -> bool {
        if !ctx.is_authenticated() {
            debug!("Skipping popular movies fetch without a token");
            return false;
        }
        match api.fetch_popular(ctx.token(), self.count).await {
            Some(movies) => {
                info!("Loaded {} popular movies", movies.len());
                self.list.set_items(Some(movies));
                true
            }
            None => false,
        }
    }

    pub fn render(&mut self, store: &FavoritesStore) -> String {
        let mut out = String::from("Popular Movies\n");
        let _ = writeln!(out, "Show: {} / {}", self.selected_length, MAX_POPULAR_LENGTH);
        out.push_str(&self.list.render(store));
        out
    }
}

pub struct FavoritesTab {
    list: ListView,
    seen_revision: Option<u64>,
    chart_url: Option<String>,
    average: Option<f64>,
}

impl Default for FavoritesTab {
    fn default() -> Self {
        Self::new()
    }
}

impl FavoritesTab {
    pub fn new() -> Self {
        Self {
            list: ListView::new(ListAction::RemoveFrom),
            seen_revision: None,
            chart_url: None,
            average: None,
        }
    }

    pub fn list(&self) -> &ListView {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListView {
        &mut self.list
    }

    pub fn chart_url(&self) -> Option<&str> {
        self.chart_url.as_deref()
    }

    pub fn average_score(&self) -> Option<f64> {
        self.average
    }

    /// Refreshes the favorites from the backend, then mirrors the store.
    pub async fn load(
        &mut self,
        store: &mut FavoritesStore,
        api: &ApiClient,
        ctx: &SessionContext,
    ) -> Result<usize, SyncError> {
        let loaded = store.load(api, ctx.token()).await;
        self.sync(store);
        loaded
    }

    /// Mirrors the store into the list when its revision moved.
    pub fn sync(&mut self, store: &FavoritesStore) {
        if self.seen_revision == Some(store.revision()) {
            return;
        }
        self.seen_revision = Some(store.revision());
        let movies = store.movies().to_vec();
        self.chart_url = (!movies.is_empty()).then(|| chart::chart_url(&movies));
        self.average = chart::average_score(&movies);
        self.list.set_items(Some(movies));
    }

    pub fn render(&mut self, store: &FavoritesStore) -> String {
        self.sync(store);
        let mut out = String::from("Favorites\n");
        out.push_str(&self.list.render(store));
        out.push_str("Average Score\n");
        match self.average {
            Some(avg) => {
                let _ = writeln!(out, "{:.2}", avg);
            }
            None => out.push_str("-\n"),
        }
        if let Some(url) = &self.chart_url {
            let _ = writeln!(out, "{}", url);
        }
        out
    }
}

/// Handle for one search request; only the newest ticket may apply its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    seq: u64,
    query: String,
}

impl SearchTicket {
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    seq: u64,
    title: String,
}

impl SelectionTicket {
    pub fn title(&self) -> &str {
        &self.title
    }
}

pub struct SearchTab {
    query: String,
    query_seq: u64,
    options: Vec<SearchOption>,
    selected: Option<String>,
    selection_seq: u64,
    same_genre: ListView,
    similar_runtime: ListView,
}

impl Default for SearchTab {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTab {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            query_seq: 0,
            options: Vec::new(),
            selected: None,
            selection_seq: 0,
            same_genre: ListView::new(ListAction::AddTo)
                .with_viewport_height(RELATED_VIEWPORT_HEIGHT),
            similar_runtime: ListView::new(ListAction::AddTo)
                .with_viewport_height(RELATED_VIEWPORT_HEIGHT),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn options(&self) -> &[SearchOption] {
        &self.options
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn same_genre(&self) -> &ListView {
        &self.same_genre
    }

    pub fn same_genre_mut(&mut self) -> &mut ListView {
        &mut self.same_genre
    }

    pub fn similar_runtime(&self) -> &ListView {
        &self.similar_runtime
    }

    pub fn similar_runtime_mut(&mut self) -> &mut ListView {
        &mut self.similar_runtime
    }

    /// Records `query` as the newest input. Any ticket issued before this one is stale.
    pub fn begin_search(&mut self, query: &str) -> SearchTicket {
        self.query_seq += 1;
        self.query = query.to_string();
        SearchTicket {
            seq: self.query_seq,
            query: self.query.clone(),
        }
    }

    /// Applies results if `ticket` is still the newest. Returns whether they were applied.
    pub fn apply_search(&mut self, ticket: &SearchTicket, options: Vec<SearchOption>) -> bool {
        if ticket.seq != self.query_seq {
            debug!(
                "Dropping stale search results for '{}' (ticket {}, current {})",
                ticket.query, ticket.seq, self.query_seq
            );
            return false;
        }
        self.options = options;
        true
    }

    pub async fn search(&mut self, api: &ApiClient, ctx: &SessionContext, query: &str) -> bool {
        let ticket = self.begin_search(query);
        let options = if ctx.is_authenticated() {
            api.search_movies(ctx.token(), ticket.query()).await
        } else {
            Vec::new()
        };
        self.apply_search(&ticket, options)
    }

    /// Selects a title (or clears the selection). Clearing empties both
    /// panels right away and yields no ticket.
    pub fn begin_select(&mut self, title: Option<&str>) -> Option<SelectionTicket> {
        self.selection_seq += 1;
        self.selected = title.map(str::to_string);
        match title {
            Some(title) => Some(SelectionTicket {
                seq: self.selection_seq,
                title: title.to_string(),
            }),
            None => {
                self.same_genre.set_items(Some(Vec::new()));
                self.similar_runtime.set_items(Some(Vec::new()));
                None
            }
        }
    }

    pub fn apply_related(&mut self, ticket: &SelectionTicket, related: RelatedMovies) -> bool {
        if ticket.seq != self.selection_seq {
            debug!("Dropping stale related movies for '{}'", ticket.title);
            return false;
        }
        self.same_genre.set_items(Some(related.same_genre));
        self.similar_runtime.set_items(Some(related.similar_runtime));
        true
    }

    pub async fn select(
        &mut self,
        api: &ApiClient,
        ctx: &SessionContext,
        title: Option<&str>,
    ) -> bool {
        let Some(ticket) = self.begin_select(title) else {
            return true;
        };
        let related = if ctx.is_authenticated() {
            api.fetch_related_both(ctx.token(), ticket.title()).await
        } else {
            RelatedMovies::default()
        };
        self.apply_related(&ticket, related)
    }

    /// Toggles `id` in whichever related panel shows it.
    pub async fn toggle(
        &self,
        id: MovieId,
        store: &mut FavoritesStore,
        api: &ApiClient,
        ctx: &SessionContext,
    ) -> Option<Affordance> {
        if self.same_genre.action_for(id, store).is_some() {
            return self.same_genre.toggle(id, store, api, ctx.token()).await;
        }
        self.similar_runtime
            .toggle(id, store, api, ctx.token())
            .await
    }

    pub fn render(&mut self, store: &FavoritesStore) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Search: {}", self.query);
        for option in &self.options {
            let marker = if self.selected.as_deref() == Some(option.title.as_str()) {
                '*'
            } else {
                '-'
            };
            let _ = writeln!(out, "{} {}", marker, option.title);
        }
        out.push_str("Movies in the Same Genres\n");
        out.push_str(&self.same_genre.render(store));
        out.push_str("Movies with Similar Runtimes\n");
        out.push_str(&self.similar_runtime.render(store));
        out
    }
}
