//! Identity service library crate.
//!
//! # Purpose
//! Principal registration and profiles, session issuance and revocation, and
//! the principal deletion saga.
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod password;
pub mod purge;
pub mod saga;
pub mod session;
pub mod store;
