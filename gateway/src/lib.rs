//! NEXUS Gateway Library
//!
//! Aggregates thermostats, cameras, relays, weather and flight feeds behind
//! one local HTTP API for the wall dashboard.

pub mod app;
pub mod discovery;
pub mod errors;
pub mod filesys;
pub mod inventory;
pub mod logs;
pub mod models;
pub mod providers;
pub mod server;
pub mod session;
pub mod storage;
pub mod utils;
pub mod vendors;
