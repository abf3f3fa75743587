//! Caller identity.
//!
//! - [`jwt`] -- access-token generation and validation. Tokens are minted by
//!   the identity provider that owns accounts; this service only verifies
//!   them and treats `sub` as the participant id.

pub mod jwt;
