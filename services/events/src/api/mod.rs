//! Event-service HTTP handlers.
pub mod campaigns;
pub mod internal;
pub mod requests;
pub mod types;
