//! Gateway library crate.
//!
//! # Purpose
//! Single public entry point. Authenticates bearer sessions, applies the
//! route table's role policy, and forwards admitted requests to the identity
//! and event services with an `x-forwarded-user` trust header attached.
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod policy;
pub mod proxy;
