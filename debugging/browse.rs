//! Log in against the backend and print the popular, favorites and (optionally) search screens.
//! Uses BACKEND_URL, MOVIEDECK_USERNAME and MOVIEDECK_PASSWORD from the environment (.env supported).
//! Pass `--search <title>` to also run a search and show related movies for the first hit.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use moviedeck::backend::{ApiClient, BackendClient};
use moviedeck::config::Config;
use moviedeck::session::{Session, Tab};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_search() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--search" {
            return args.next();
        }
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let username = env::var("MOVIEDECK_USERNAME").context("Missing MOVIEDECK_USERNAME in environment")?;
    let password = env::var("MOVIEDECK_PASSWORD").context("Missing MOVIEDECK_PASSWORD in environment")?;

    let backend = BackendClient::from_config(&config)?;
    info!("Using backend {}", backend.base_url());
    let mut session = Session::from_config(ApiClient::new(Arc::new(backend)), &config);

    if !session.login(&username, &password).await {
        anyhow::bail!(
            "Login failed: {}",
            session.message().unwrap_or("no message")
        );
    }
    session.set_popular_length(config.popular_count as usize);
    println!("{}", session.render());

    session.navigate(Tab::Favorites).await;
    println!("{}", session.render());

    if let Some(query) = parse_search() {
        session.navigate(Tab::Search).await;
        session.search(&query).await;
        let first = match session.mounted() {
            Some(moviedeck::session::MountedTab::Search(tab)) => {
                tab.options().first().map(|o| o.title.clone())
            }
            _ => None,
        };
        session.select(first.as_deref()).await;
        println!("{}", session.render());
    }

    Ok(())
}
