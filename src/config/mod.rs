//! Configuration module - environment-driven application settings and
//! database bootstrap.

pub mod app;
pub mod database;

pub use app::AppConfig;
pub use database::{create_connection, create_tables};
