pub mod admin;
pub mod blocks;
pub mod presence;
pub mod queue;
pub mod rooms;
