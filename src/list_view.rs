//! Headless list of movies with hover tracking and a favorite toggle per row.
//!
//! Rows are built once per `(items, length)` pair and shared as an
//! `Arc<[ListRow]>`; moving the hover cursor never rebuilds them. Everything
//! a row does is keyed by movie id, so a store mutation that reorders or
//! shrinks the list cannot retarget a click.

use crate::backend::ApiClient;
use crate::favorites::FavoritesStore;
use crate::models::{Movie, MovieId};
use std::fmt::Write as _;
use std::sync::Arc;

pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 300;
pub const ROW_HEIGHT: u32 = 30;

const TITLE_WIDTH: usize = 32;
const DATE_WIDTH: usize = 12;
const RATING_WIDTH: usize = 6;
const GENRES_WIDTH: usize = 28;

pub type HoverCallback = Box<dyn FnMut(Option<&Movie>) + Send>;

/// Caption shown above the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    AddTo,
    RemoveFrom,
}

impl ListAction {
    pub fn caption(&self) -> &'static str {
        match self {
            ListAction::AddTo => "Click row to add to favorites",
            ListAction::RemoveFrom => "Click row to remove from favorites",
        }
    }
}

/// Display-ready columns of one movie.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub id: MovieId,
    pub title: String,
    pub release_date: String,
    pub rating: String,
    pub genres: String,
}

impl From<&Movie> for ListRow {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            release_date: movie.release_date.clone(),
            rating: movie.vote_average.to_string(),
            genres: movie.genre_label(),
        }
    }
}

/// Icon state of a row's favorite button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Not a favorite yet; plus icon.
    Add,
    /// Already a favorite; check icon.
    Remove,
}

impl Affordance {
    pub fn symbol(&self) -> &'static str {
        match self {
            Affordance::Add => "+",
            Affordance::Remove => "✓",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteAction {
    Add(Movie),
    Remove(MovieId),
}

pub struct ListView {
    items: Option<Vec<Movie>>,
    length: Option<usize>,
    viewport_height: u32,
    scroll_offset: usize,
    hovered: Option<MovieId>,
    on_hover: Option<HoverCallback>,
    action: ListAction,
    rows: Option<Arc<[ListRow]>>,
    generation: u64,
    rebuilds: u64,
    affordances: Option<AffordanceCache>,
}

struct AffordanceCache {
    generation: u64,
    revision: u64,
    states: Vec<Affordance>,
}

impl ListView {
    pub fn new(action: ListAction) -> Self {
        Self {
            items: None,
            length: None,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_offset: 0,
            hovered: None,
            on_hover: None,
            action,
            rows: None,
            generation: 0,
            rebuilds: 0,
            affordances: None,
        }
    }

    pub fn with_viewport_height(mut self, height: u32) -> Self {
        self.viewport_height = height.max(ROW_HEIGHT);
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn on_hover(mut self, callback: HoverCallback) -> Self {
        self.on_hover = Some(callback);
        self
    }

    pub fn action(&self) -> ListAction {
        self.action
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn items(&self) -> Option<&[Movie]> {
        self.items.as_deref()
    }

    /// `None` is the not-yet-loaded state and renders as an empty list.
    pub fn set_items(&mut self, items: Option<Vec<Movie>>) {
        self.items = items;
        self.invalidate();
        if let Some(id) = self.hovered {
            if !self.displays(id) {
                self.set_hover(None);
            }
        }
    }

    pub fn set_length(&mut self, length: Option<usize>) {
        if self.length != length {
            self.length = length;
            self.invalidate();
            if let Some(id) = self.hovered {
                if !self.displays(id) {
                    self.set_hover(None);
                }
            }
        }
    }

    fn invalidate(&mut self) {
        self.rows = None;
        self.affordances = None;
        self.generation += 1;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    fn displayed(&self) -> &[Movie] {
        let items = self.items.as_deref().unwrap_or_default();
        let cap = self.length.unwrap_or(usize::MAX).min(items.len());
        &items[..cap]
    }

    fn displays(&self, id: MovieId) -> bool {
        self.displayed().iter().any(|m| m.id == id)
    }

    /// Memoized rows: at most `min(length, items.len())`, in input order.
    pub fn rows(&mut self) -> Arc<[ListRow]> {
        if let Some(rows) = &self.rows {
            return rows.clone();
        }
        let rows: Arc<[ListRow]> = self.displayed().iter().map(ListRow::from).collect();
        self.rebuilds += 1;
        self.rows = Some(rows.clone());
        rows
    }

    /// How many times the row sequence has been rebuilt.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn hovered(&self) -> Option<MovieId> {
        self.hovered
    }

    pub fn is_highlighted(&self, id: MovieId) -> bool {
        self.hovered == Some(id)
    }

    /// Highlights `id` exclusively. Ids not shown in the list are ignored.
    pub fn hover(&mut self, id: MovieId) {
        if self.displays(id) {
            self.set_hover(Some(id));
        }
    }

    /// Clears the highlight if `id` is the hovered row.
    pub fn leave(&mut self, id: MovieId) {
        if self.hovered == Some(id) {
            self.set_hover(None);
        }
    }

    fn set_hover(&mut self, id: Option<MovieId>) {
        if self.hovered == id {
            return;
        }
        self.hovered = id;
        if let Some(callback) = self.on_hover.as_mut() {
            let movie = id.and_then(|id| {
                self.items
                    .as_deref()
                    .and_then(|items| items.iter().find(|m| m.id == id))
            });
            callback(movie);
        }
    }

    /// Per-row icon state, recomputed only when the rows or the store revision change.
    pub fn affordances(&mut self, store: &FavoritesStore) -> &[Affordance] {
        let fresh = matches!(
            &self.affordances,
            Some(cache) if cache.generation == self.generation && cache.revision == store.revision()
        );
        if !fresh {
            let states = self
                .rows()
                .iter()
                .map(|row| {
                    if store.contains(row.id) {
                        Affordance::Remove
                    } else {
                        Affordance::Add
                    }
                })
                .collect();
            self.affordances = Some(AffordanceCache {
                generation: self.generation,
                revision: store.revision(),
                states,
            });
        }
        match &self.affordances {
            Some(cache) => &cache.states,
            None => &[],
        }
    }

    pub fn affordance(&self, id: MovieId, store: &FavoritesStore) -> Option<Affordance> {
        if !self.displays(id) {
            return None;
        }
        Some(if store.contains(id) {
            Affordance::Remove
        } else {
            Affordance::Add
        })
    }

    /// What clicking the button on row `id` would do.
    pub fn action_for(&self, id: MovieId, store: &FavoritesStore) -> Option<FavoriteAction> {
        let movie = self.displayed().iter().find(|m| m.id == id)?;
        Some(if store.contains(id) {
            FavoriteAction::Remove(id)
        } else {
            FavoriteAction::Add(movie.clone())
        })
    }

    /// Runs the row's favorite toggle against the store. Returns the
    /// affordance the row shows afterwards.
    pub async fn toggle(
        &self,
        id: MovieId,
        store: &mut FavoritesStore,
        api: &ApiClient,
        token: &str,
    ) -> Option<Affordance> {
        match self.action_for(id, store)? {
            FavoriteAction::Add(movie) => {
                store.add_favorite(api, token, movie).await;
            }
            FavoriteAction::Remove(id) => {
                store.remove_favorite(api, token, id).await;
            }
        }
        self.affordance(id, store)
    }

    /// Rows that fit in the viewport.
    pub fn visible_capacity(&self) -> usize {
        (self.viewport_height / ROW_HEIGHT).max(1) as usize
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    fn max_scroll(&self) -> usize {
        self.displayed().len().saturating_sub(self.visible_capacity())
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let target = if delta.is_negative() {
            self.scroll_offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_offset.saturating_add(delta as usize)
        };
        self.scroll_offset = target.min(self.max_scroll());
    }

    /// Plain-text table of the visible window.
    pub fn render(&mut self, store: &FavoritesStore) -> String {
        let rows = self.rows();
        let start = self.scroll_offset.min(rows.len());
        let end = (start + self.visible_capacity()).min(rows.len());
        let hovered = self.hovered;
        let states = self.affordances(store).to_vec();

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.action.caption());
        let _ = writeln!(
            out,
            "  {:<tw$} {:<dw$} {:<rw$} {:<gw$} +",
            "Title",
            "Release Date",
            "Rating",
            "Genres",
            tw = TITLE_WIDTH,
            dw = DATE_WIDTH,
            rw = RATING_WIDTH,
            gw = GENRES_WIDTH,
        );
        for (row, state) in rows[start..end].iter().zip(&states[start..end]) {
            let marker = if hovered == Some(row.id) { '>' } else { ' ' };
            let _ = writeln!(
                out,
                "{} {:<tw$} {:<dw$} {:<rw$} {:<gw$} {}",
                marker,
                fit(&row.title, TITLE_WIDTH),
                fit(&row.release_date, DATE_WIDTH),
                fit(&row.rating, RATING_WIDTH),
                fit(&row.genres, GENRES_WIDTH),
                state.symbol(),
                tw = TITLE_WIDTH,
                dw = DATE_WIDTH,
                rw = RATING_WIDTH,
                gw = GENRES_WIDTH,
            );
        }
        out
    }
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
