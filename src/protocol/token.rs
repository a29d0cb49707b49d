//! Freeform parenthesized tokens broadcast by drones.
//!
//! ```text
//! (POS,<id>,<x>,<y>)
//! ("REACHED",<id>,<x>,<y>)
//! ```
//!
//! Drones always emit the quoted `"REACHED"` spelling. Parsers accept both the
//! quoted and the bare `REACHED` tag.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use super::{AgentId, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Periodic position broadcast
    Position { id: AgentId, point: Point },
    /// One-shot arrival notice
    Reached { id: AgentId, point: Point },
}

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r#"^\s*\((POS|"REACHED"|REACHED),\s*(\d+),\s*(-?\d+),\s*(-?\d+)\s*\)\s*$"#)
            .expect("token pattern is valid")
    })
}

impl Token {
    /// Parse a token; `None` for anything that is not a well-formed token.
    pub fn parse(text: &str) -> Option<Token> {
        let captures = token_regex().captures(text)?;
        let id = captures[2].parse::<AgentId>().ok()?;
        let x = captures[3].parse::<i32>().ok()?;
        let y = captures[4].parse::<i32>().ok()?;
        let point = Point::new(x, y);

        match &captures[1] {
            "POS" => Some(Token::Position { id, point }),
            _ => Some(Token::Reached { id, point }),
        }
    }

    pub fn id(&self) -> AgentId {
        match self {
            Token::Position { id, .. } | Token::Reached { id, .. } => *id,
        }
    }

    pub fn point(&self) -> Point {
        match self {
            Token::Position { point, .. } | Token::Reached { point, .. } => *point,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Position { id, point } => write!(f, "(POS,{},{},{})", id, point.x, point.y),
            Token::Reached { id, point } => {
                write!(f, "(\"REACHED\",{},{},{})", id, point.x, point.y)
            }
        }
    }
}
