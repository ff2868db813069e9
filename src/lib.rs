//! Terminal map of wineries: a static catalog merged with per-user
//! visit, favorite and wishlist status, clustered for the viewport.

pub mod app;
pub mod auth;
pub mod braille;
pub mod catalog;
pub mod cluster;
pub mod config;
pub mod error;
pub mod filter;
pub mod geo;
pub mod location;
pub mod logging;
pub mod map;
pub mod merge;
pub mod session;
pub mod status;
pub mod ui;
