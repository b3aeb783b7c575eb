pub mod app;
pub mod backend;
pub mod chart;
pub mod config;
pub mod favorites;
pub mod list_view;
pub mod models;
pub mod session;
pub mod tabs;
