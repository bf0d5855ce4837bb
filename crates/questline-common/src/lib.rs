//! Plumbing shared by the questline services.
//!
//! # Purpose
//! Keeps the HTTP error shape, the forwarded-identity extractor, and the
//! tracing/metrics bootstrap identical across the gateway, identity, and
//! events services.
pub mod error;
pub mod forwarded;
pub mod observability;

pub use error::{ApiError, ErrorResponse};
pub use forwarded::Forwarded;
