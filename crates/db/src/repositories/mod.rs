//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Methods with an `_in` suffix take
//! an open connection instead so several repositories can share one
//! transaction.

pub mod block_repo;
pub mod call_session_repo;
pub mod pairing_repo;
pub mod participant_repo;
pub mod queue_repo;
pub mod room_repo;

pub use block_repo::BlockRepo;
pub use call_session_repo::CallSessionRepo;
pub use pairing_repo::{PairingOptions, PairingOutcome, PairingRepo};
pub use participant_repo::ParticipantRepo;
pub use queue_repo::QueueRepo;
pub use room_repo::RoomRepo;
