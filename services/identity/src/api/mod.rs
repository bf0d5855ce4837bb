//! Identity HTTP handlers.
pub mod admin;
pub mod auth;
pub mod internal;
pub mod profile;
pub mod types;
