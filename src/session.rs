//! Session shell: login state, the token, the favorites store and the
//! mounted tab.

use crate::backend::ApiClient;
use crate::config::Config;
use crate::favorites::{FavoritesPolicy, FavoritesStore, SyncError};
use crate::list_view::Affordance;
use crate::models::{AccountOutcome, MovieId};
use crate::tabs::{FavoritesTab, PopularTab, SearchTab};
use tracing::{info, warn};

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Read-only view of the session handed to tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: String,
}

impl SessionContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Login,
    Popular,
    Favorites,
    Search,
}

pub enum MountedTab {
    Popular(PopularTab),
    Favorites(FavoritesTab),
    Search(SearchTab),
}

pub struct Session {
    api: ApiClient,
    popular_count: u32,
    context: SessionContext,
    tab: Tab,
    mounted: Option<MountedTab>,
    message: Option<String>,
    favorites: FavoritesStore,
}

impl Session {
    pub fn new(api: ApiClient, popular_count: u32, policy: FavoritesPolicy) -> Self {
        Self {
            api,
            popular_count,
            context: SessionContext::default(),
            tab: Tab::Login,
            mounted: None,
            message: None,
            favorites: FavoritesStore::new(policy),
        }
    }

    pub fn from_config(api: ApiClient, config: &Config) -> Self {
        Self::new(api, config.popular_count, config.favorites_policy)
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn is_logged_in(&self) -> bool {
        self.context.is_authenticated()
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn mounted(&self) -> Option<&MountedTab> {
        self.mounted.as_ref()
    }

    pub fn mounted_mut(&mut self) -> Option<&mut MountedTab> {
        self.mounted.as_mut()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    /// Logs in, loads favorites once and opens the popular tab.
    pub async fn login(&mut self, username: &str, password: &str) -> bool {
        let token = match self.api.login(username, password).await {
            Some(t) if !t.token.is_empty() => t.token,
            _ => {
                self.message = Some(LOGIN_FAILED_MESSAGE.to_string());
                return false;
            }
        };
        self.context = SessionContext::new(token);
        self.message = None;
        self.favorites.clear();
        if let Err(e) = self.favorites.load(&self.api, self.context.token()).await {
            warn!("Favorites not loaded after login: {}", e);
        }
        self.mount(Tab::Popular).await;
        true
    }

    pub async fn create_account(&mut self, username: &str, password: &str) -> AccountOutcome {
        let outcome = self.api.create_account(username, password).await;
        self.message = outcome.message.clone();
        outcome
    }

    pub fn logout(&mut self) {
        info!("Logging out");
        self.context = SessionContext::default();
        self.favorites.clear();
        self.message = None;
        self.mounted = None;
        self.tab = Tab::Login;
    }

    /// Switches tabs. Anything but `Login` is refused while logged out;
    /// choosing `Login` while logged in logs out.
    pub async fn navigate(&mut self, tab: Tab) -> bool {
        if tab == Tab::Login {
            self.logout();
            return true;
        }
        if !self.is_logged_in() {
            return false;
        }
        if tab != self.tab {
            self.mount(tab).await;
        }
        true
    }

    async fn mount(&mut self, tab: Tab) {
        self.tab = tab;
        let mounted = match tab {
            Tab::Login => None,
            Tab::Popular => {
                let mut popular = PopularTab::new(self.popular_count);
                popular.load(&self.api, &self.context).await;
                Some(MountedTab::Popular(popular))
            }
            Tab::Favorites => {
                let mut favorites = FavoritesTab::new();
                if let Err(e) = favorites
                    .load(&mut self.favorites, &self.api, &self.context)
                    .await
                {
                    warn!("Showing cached favorites: {}", e);
                }
                Some(MountedTab::Favorites(favorites))
            }
            Tab::Search => Some(MountedTab::Search(SearchTab::new())),
        };
        self.mounted = mounted;
    }

    /// Re-fetches favorites from the backend, replacing the local set.
    pub async fn reload_favorites(&mut self) -> Result<usize, SyncError> {
        let loaded = self
            .favorites
            .load(&self.api, self.context.token())
            .await;
        if let Some(MountedTab::Favorites(tab)) = self.mounted.as_mut() {
            tab.sync(&self.favorites);
        }
        loaded
    }

    pub fn set_popular_length(&mut self, length: usize) {
        if let Some(MountedTab::Popular(tab)) = self.mounted.as_mut() {
            tab.set_length(length);
        }
    }

    pub async fn search(&mut self, query: &str) -> bool {
        match self.mounted.as_mut() {
            Some(MountedTab::Search(tab)) => tab.search(&self.api, &self.context, query).await,
            _ => false,
        }
    }

    pub async fn select(&mut self, title: Option<&str>) -> bool {
        match self.mounted.as_mut() {
            Some(MountedTab::Search(tab)) => tab.select(&self.api, &self.context, title).await,
            _ => false,
        }
    }

    /// Clicks the favorite button of row `id` in the mounted tab.
    pub async fn toggle_favorite(&mut self, id: MovieId) -> Option<Affordance> {
        let token = self.context.token();
        let result = match self.mounted.as_ref()? {
            MountedTab::Popular(tab) => {
                tab.list()
                    .toggle(id, &mut self.favorites, &self.api, token)
                    .await
            }
            MountedTab::Favorites(tab) => {
                tab.list()
                    .toggle(id, &mut self.favorites, &self.api, token)
                    .await
            }
            MountedTab::Search(tab) => {
                tab.toggle(id, &mut self.favorites, &self.api, &self.context)
                    .await
            }
        };
        if let Some(MountedTab::Favorites(tab)) = self.mounted.as_mut() {
            tab.sync(&self.favorites);
        }
        result
    }

    pub fn render(&mut self) -> String {
        let mut out = String::new();
        if !self.is_logged_in() {
            out.push_str("Log in\n");
            if let Some(message) = &self.message {
                out.push_str(message);
                out.push('\n');
            }
            return out;
        }
        let tabs = [
            (Tab::Popular, "Popular"),
            (Tab::Favorites, "Favorites"),
            (Tab::Search, "Search"),
        ];
        let bar: Vec<String> = tabs
            .iter()
            .map(|(tab, name)| {
                if *tab == self.tab {
                    format!("[{}]", name)
                } else {
                    name.to_string()
                }
            })
            .collect();
        out.push_str(&bar.join(" | "));
        out.push_str(" | Log out\n");
        match self.mounted.as_mut() {
            Some(MountedTab::Popular(tab)) => out.push_str(&tab.render(&self.favorites)),
            Some(MountedTab::Favorites(tab)) => out.push_str(&tab.render(&self.favorites)),
            Some(MountedTab::Search(tab)) => out.push_str(&tab.render(&self.favorites)),
            None => {}
        }
        out
    }
}
