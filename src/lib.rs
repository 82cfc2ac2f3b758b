//! Touchline: cached access to published club news articles.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
