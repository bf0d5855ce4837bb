//! Identity claims shared by the gateway and the internal services.
//!
//! # Purpose
//! The gateway verifies a signed session once, derives a [`ForwardedClaim`]
//! from it, and hands that claim to downstream services as a percent-encoded
//! JSON header. Downstream services decode the header with [`decode_header`]
//! and never touch the signing secret.
//!
//! # Key invariants
//! - A forwarded claim is built field-by-field from a verified
//!   [`SessionClaims`]; its role is copied, never raised.
//! - The trust header carries exactly
//!   `{principalId, handle, role, tokenExpiry, tokenId}`.
//!
//! # Security considerations
//! - The trust header is unsigned. Internal services must only be reachable
//!   through the gateway, which strips client-supplied copies of the header.
pub mod claim;
pub mod codec;
pub mod errors;
pub mod role;
pub mod session;

pub use claim::ForwardedClaim;
pub use codec::{TRUST_HEADER, decode, decode_header, encode};
pub use errors::{TrustError, TrustResult};
pub use role::Role;
pub use session::{SessionClaims, SessionKeys, TokenKind, unix_now};
