//! DomusEye: property management backend.
//!
//! Sled-backed collections for users, listings, applications and messages,
//! an Axum REST API on top, and thin proxies to a hosted language model and
//! the ImageKit media host.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod imagekit;
pub mod llm;
pub mod logging;
pub mod models;
pub mod nearby;
pub mod notifications;
// Search filters and pagination over the properties collection
pub mod query;
// REST API module: Axum HTTP handlers, auth middleware, OpenAPI docs
pub mod rest;
pub mod storage;
pub mod ui_stream;
pub mod validation;
