//! Connection manager and outbound command encoding.

pub mod command;
pub mod manager;

pub use command::TmuxCommand;
pub use manager::{ConnectionManager, ConnectionPhase};
