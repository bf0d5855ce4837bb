//! Event service library crate.
//!
//! # Purpose
//! Campaign and reward catalog, reward requests, the login-driven progress
//! pipeline, and the per-principal delete/restore endpoints used by the
//! identity service's deletion saga.
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod progress;
pub mod purge;
pub mod store;
