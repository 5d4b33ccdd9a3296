//! # Knowledge Base Integrations
//!
//! Provider adapters, the action dispatcher, the OAuth connection flow and
//! the document sync orchestrator behind the integrations HTTP API.

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod models;
pub mod normalization;
pub mod oauth;
pub mod providers;
pub mod repositories;
pub mod server;
pub mod sync;
pub mod telemetry;
pub use migration;
