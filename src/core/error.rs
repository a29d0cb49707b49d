use std::net::SocketAddr;

use thiserror::Error;

use crate::protocol::AgentId;

/// Custom error types for the swarm processes
#[derive(Error, Debug)]
pub enum SwarmError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A socket could not be bound to its listening address
    #[error("Failed to bind {addr}: {source}")]
    BindError {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An address could not be derived for an agent
    #[error("No address for agent {0}")]
    AddressError(AgentId),

    /// Datagram send failures
    #[error("Failed to send to {addr}: {source}")]
    SendError {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Datagram receive failures
    #[error("Failed to receive datagram: {0}")]
    ReceiveError(#[source] std::io::Error),

    /// Structured message decode failures
    #[error("Failed to decode message: {0}")]
    DecodeError(#[from] serde_json::Error),

    /// Agent ids outside the configured swarm
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// Grid dimensions that cannot be explored
    #[error("Invalid grid: {0}")]
    GridError(String),

    /// Scenario generation errors
    #[error("Invalid scenario: {0}")]
    ScenarioError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type SwarmResult<T> = std::result::Result<T, SwarmError>;
