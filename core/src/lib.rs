//! Ladder core: match history, rating replay with reigns and crowns, and
//! doubles chemistry regression, persisted in SQLite.

pub mod chemistry;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod profile;
pub mod rating;
pub mod record;
pub mod replay;
pub mod ridge;
pub mod store;
pub mod types;
