// src/lib.rs
pub mod api;
pub mod app;
pub mod capture;
pub mod charts;
pub mod config;
pub mod effects;
pub mod emotion_client;
pub mod error;
pub mod form;
pub mod logger;
pub mod models;
pub mod notify;
pub mod page;
pub mod ui;

pub use error::{MoodSyncError, Result};
