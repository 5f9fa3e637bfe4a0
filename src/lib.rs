// src/lib.rs
pub mod app;
pub mod catalog;
pub mod config;
pub mod episode;
pub mod errors;
pub mod event;
pub mod feed;
pub mod fetch;
pub mod player;
pub mod resolver;
pub mod session;
pub mod station;
pub mod ui;
