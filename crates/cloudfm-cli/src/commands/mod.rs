pub mod auth;
pub mod completions;
pub mod config;
mod dialog;
pub mod document;
pub mod list;
pub mod providers;
