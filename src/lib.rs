pub mod api;
pub mod config;
pub mod error;
pub mod market;
pub mod ui;
