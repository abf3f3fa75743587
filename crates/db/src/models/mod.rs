//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` request DTOs where the API accepts input for that entity

pub mod block;
pub mod call_session;
pub mod participant;
pub mod queue_entry;
pub mod room;
pub mod status;
