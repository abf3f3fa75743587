//! Pure domain rules for voice pairing.
//!
//! Nothing in this crate touches the database or the network. The `db`,
//! `worker` and `api` crates call into these functions so the rules that
//! decide who may be paired, how long a session may run, and when state is
//! considered abandoned live in one place and are unit-testable.

pub mod error;
pub mod liveness;
pub mod matching;
pub mod roles;
pub mod session;
pub mod types;
