pub mod app;
pub mod auth;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod services;

pub use app::{build_app, AppState};
