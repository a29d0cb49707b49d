//! Wire protocol shared by drones, the ground station and the simulator.
//!
//! Two encodings travel over the same sockets:
//! - structured JSON [`Message`]s for `GO`, `REACHED`, `DOWN` and `PATH`
//! - freeform parenthesized [`Token`]s for position and arrival broadcasts

pub mod message;
pub mod token;

pub use message::{Content, Message, Point};
pub use token::Token;

/// Identity of an agent. Drones use small positive ids.
pub type AgentId = u32;

/// Reserved identity of the ground station.
pub const GROUND_STATION_ID: AgentId = 0;

/// Every logical message must fit in one datagram of this size.
pub const MAX_DATAGRAM_SIZE: usize = 1024;
