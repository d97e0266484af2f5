//! Newsdesk - A news publishing backend
//!
//! Articles with curated featured/trending rails, web stories, web push
//! notifications and on-demand SEO scoring, served over a JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
