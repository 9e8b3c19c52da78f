//! Parley - a terminal client for ADK-style agent services.
//!
//! This library exposes modules for use in integration tests.

pub mod client;
pub mod config;
pub mod controller;
pub mod models;
pub mod sse;
pub mod storage;
pub mod store;
