//! Structured protocol messages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AgentId, GROUND_STATION_ID};
use crate::core::error::SwarmResult;

/// Integer grid point. On the wire it is a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [i32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Message discriminator.
///
/// Unrecognised strings are kept as `Unknown` so that a newer peer cannot
/// crash an older one; every consumer ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Content {
    /// Assign a goal point to a drone
    Go,
    /// A drone arrived at its goal
    Reached,
    /// An agent failed and must be excluded from connectivity
    Down,
    /// Routing queue of hop identities towards the ground station
    Path,
    Unknown(String),
}

impl Content {
    pub fn as_str(&self) -> &str {
        match self {
            Content::Go => "GO",
            Content::Reached => "REACHED",
            Content::Down => "DOWN",
            Content::Path => "PATH",
            Content::Unknown(other) => other,
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Unknown(String::new())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GO" => Content::Go,
            "REACHED" => Content::Reached,
            "DOWN" => Content::Down,
            "PATH" => Content::Path,
            _ => Content::Unknown(value),
        }
    }
}

impl From<Content> for String {
    fn from(content: Content) -> Self {
        match content {
            Content::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured protocol message.
///
/// Encoded as a JSON object with PascalCase keys. Absent fields decode to
/// zero values: sender 0, point `(0, 0)` and an empty path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Message {
    pub sender: AgentId,
    pub content: Content,
    pub point: Point,
    #[serde(alias = "Queue")]
    pub path: Vec<AgentId>,
}

impl Message {
    /// Goal assignment from the ground station
    pub fn go(point: Point) -> Self {
        Self {
            sender: GROUND_STATION_ID,
            content: Content::Go,
            point,
            path: Vec::new(),
        }
    }

    /// Arrival report from a drone
    pub fn reached(sender: AgentId, point: Point) -> Self {
        Self {
            sender,
            content: Content::Reached,
            point,
            path: Vec::new(),
        }
    }

    /// Failure report about `sender`
    pub fn down(sender: AgentId) -> Self {
        Self {
            sender,
            content: Content::Down,
            ..Default::default()
        }
    }

    /// Route assignment from the simulator
    pub fn path(hops: Vec<AgentId>) -> Self {
        Self {
            sender: GROUND_STATION_ID,
            content: Content::Path,
            point: Point::default(),
            path: hops,
        }
    }

    pub fn encode(&self) -> SwarmResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> SwarmResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
