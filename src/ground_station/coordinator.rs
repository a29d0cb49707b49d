//! Exploration coordinator: the ground station's protocol logic.
//!
//! The coordinator owns the grid, the last-known position table, the down
//! flags and the connectivity matrix. It performs no I/O; every handler returns
//! the datagrams the caller should send once the coordinator lock is released.

use log::{debug, info, warn};

use super::connectivity::ConnectivityMatrix;
use super::grid::Grid;
use crate::core::config::GroundStationConfig;
use crate::core::error::{SwarmError, SwarmResult};
use crate::protocol::{AgentId, Content, Message, Point, Token};

/// Literal sent to the visualizer once every cell has been visited
pub const SUCCESS_SIGNAL: &str = "SUCCESS";

/// A datagram produced by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Structured message to a drone's listening address
    ToDrone(AgentId, Message),
    /// Text payload for the visualizer
    ToCollector(String),
}

pub struct Coordinator {
    grid: Grid,
    connectivity: ConnectivityMatrix,
    positions: Vec<Option<Point>>,
    down: Vec<bool>,
    dispatched: Vec<bool>,
    completed: bool,
    station: Point,
    radius: f64,
}

impl Coordinator {
    pub fn new(total_drones: usize, grid_size: usize, config: &GroundStationConfig) -> Self {
        let slots = total_drones + 1;
        Self {
            grid: Grid::new(grid_size),
            connectivity: ConnectivityMatrix::new(total_drones),
            positions: vec![None; slots],
            down: vec![false; slots],
            dispatched: vec![false; slots],
            completed: false,
            station: config.position,
            radius: config.connectivity_radius,
        }
    }

    pub fn total_drones(&self) -> usize {
        self.connectivity.drones()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn connectivity(&self) -> &ConnectivityMatrix {
        &self.connectivity
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Last reported position of a drone
    pub fn position(&self, id: AgentId) -> Option<Point> {
        self.slot(id).ok().and_then(|slot| self.positions[slot])
    }

    pub fn is_down(&self, id: AgentId) -> bool {
        self.slot(id).map(|slot| self.down[slot]).unwrap_or(false)
    }

    fn slot(&self, id: AgentId) -> SwarmResult<usize> {
        let slot = id as usize;
        if id == 0 || slot > self.total_drones() {
            return Err(SwarmError::UnknownAgent(id));
        }
        Ok(slot)
    }

    /// Classify and apply one raw datagram.
    ///
    /// Freeform tokens are tried first, then structured messages. Anything
    /// else is dropped.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Vec<Outbound> {
        let text = String::from_utf8_lossy(bytes);

        let result = if let Some(token) = Token::parse(&text) {
            match token {
                Token::Position { id, point } => self.record_position(id, point),
                Token::Reached { id, point } => self.handle_reached(id, point),
            }
        } else {
            match Message::decode(bytes) {
                Ok(message) => self.handle_message(message),
                Err(_) => {
                    debug!("Ground station: dropping unrecognised datagram {:?}", text);
                    Ok(Vec::new())
                }
            }
        };

        result.unwrap_or_else(|err| {
            warn!("Ground station: ignoring report: {}", err);
            Vec::new()
        })
    }

    /// Apply a structured message
    pub fn handle_message(&mut self, message: Message) -> SwarmResult<Vec<Outbound>> {
        match message.content {
            Content::Reached => self.handle_reached(message.sender, message.point),
            Content::Down => {
                self.handle_down(message.sender)?;
                Ok(Vec::new())
            }
            other => {
                debug!(
                    "Ground station: ignoring {} message from {}",
                    other, message.sender
                );
                Ok(Vec::new())
            }
        }
    }

    /// Store a position broadcast. The first in-grid report from a drone
    /// dispatches it as if it had arrived at that cell.
    pub fn record_position(&mut self, id: AgentId, point: Point) -> SwarmResult<Vec<Outbound>> {
        let slot = self.slot(id)?;
        self.positions[slot] = Some(point);
        debug!("Ground station: drone {} at {}", id, point);

        if !self.dispatched[slot] && self.grid.contains(point) {
            info!("Ground station: first sight of drone {} at {}", id, point);
            return self.handle_reached(id, point);
        }
        Ok(Vec::new())
    }

    /// Arrival handling: record, mark visited, check completion, dispatch next
    pub fn handle_reached(&mut self, id: AgentId, point: Point) -> SwarmResult<Vec<Outbound>> {
        let slot = self.slot(id)?;
        self.positions[slot] = Some(point);
        self.dispatched[slot] = true;

        if !self.grid.contains(point) {
            warn!(
                "Ground station: drone {} reported {} outside the {}x{} grid",
                id,
                point,
                self.grid.size(),
                self.grid.size()
            );
            return Ok(Vec::new());
        }

        let mut outbound = Vec::new();
        if self.grid.mark_visited(point) {
            info!(
                "Ground station: drone {} explored {} ({}/{})",
                id,
                point,
                self.grid.visited_count(),
                self.grid.size() * self.grid.size()
            );
        }

        if !self.completed && self.grid.is_complete() {
            self.completed = true;
            info!("Ground station: grid fully explored");
            outbound.push(Outbound::ToCollector(SUCCESS_SIGNAL.to_string()));
        }

        match self.next_frontier(id) {
            Some(next) => {
                info!("Ground station: sending drone {} to {}", id, next);
                outbound.push(Outbound::ToDrone(id, Message::go(next)));
            }
            None => debug!("Ground station: no frontier left for drone {}", id),
        }
        Ok(outbound)
    }

    /// Permanently exclude a drone from connectivity
    pub fn handle_down(&mut self, id: AgentId) -> SwarmResult<()> {
        let slot = self.slot(id)?;
        if !self.down[slot] {
            warn!("Ground station: drone {} is down", id);
        }
        self.down[slot] = true;
        Ok(())
    }

    /// Closest unvisited cell to the drone's last-known cell
    pub fn next_frontier(&self, id: AgentId) -> Option<Point> {
        let origin = self.position(id)?;
        self.grid.closest_unvisited(origin)
    }

    /// Recompute the connectivity matrix; returns the visualizer snapshot
    /// when any link changed.
    pub fn update_connectivity(&mut self) -> Option<String> {
        let changed = self
            .connectivity
            .update(self.station, &self.positions, &self.down, self.radius);
        changed.then(|| self.connectivity.snapshot_text(&self.down))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drone::DroneState;

    fn coordinator(drones: usize, grid: usize) -> Coordinator {
        Coordinator::new(drones, grid, &GroundStationConfig::default())
    }

    fn go_target(outbound: &[Outbound], drone: AgentId) -> Option<Point> {
        outbound.iter().find_map(|out| match out {
            Outbound::ToDrone(id, message) if *id == drone && message.content == Content::Go => {
                Some(message.point)
            }
            _ => None,
        })
    }

    fn has_success(outbound: &[Outbound]) -> bool {
        outbound
            .iter()
            .any(|out| *out == Outbound::ToCollector(SUCCESS_SIGNAL.to_string()))
    }

    #[test]
    fn first_position_report_dispatches_drone() {
        let mut gs = coordinator(1, 3);
        let out = gs.handle_datagram(b"(POS,1,0,0)");
        assert_eq!(go_target(&out, 1), Some(Point::new(1, 0)));
        assert_eq!(gs.position(1), Some(Point::new(0, 0)));

        // later broadcasts only update the position table
        let out = gs.handle_datagram(b"(POS,1,1,0)");
        assert!(out.is_empty());
        assert_eq!(gs.position(1), Some(Point::new(1, 0)));
    }

    #[test]
    fn position_outside_grid_does_not_dispatch() {
        let mut gs = coordinator(1, 2);
        assert!(gs.handle_datagram(b"(POS,1,5,5)").is_empty());
        assert_eq!(gs.position(1), Some(Point::new(5, 5)));
        assert_eq!(gs.grid().visited_count(), 0);

        // dispatch happens once it enters the grid
        let out = gs.handle_datagram(b"(POS,1,1,1)");
        assert!(go_target(&out, 1).is_some());
    }

    #[test]
    fn token_and_message_arrivals_behave_identically() {
        let reports: [&[u8]; 3] = [
            b"(\"REACHED\",1,1,1)",
            b"(REACHED,1,1,1)",
            br#"{"Sender":1,"Content":"REACHED","Point":[1,1]}"#,
        ];
        let outcomes: Vec<Vec<Outbound>> = reports
            .iter()
            .map(|report| {
                let mut gs = coordinator(1, 3);
                gs.handle_datagram(report)
            })
            .collect();

        assert_eq!(go_target(&outcomes[0], 1), Some(Point::new(0, 1)));
        assert!(outcomes.iter().all(|out| *out == outcomes[0]));
    }

    #[test]
    fn arrival_refreshes_last_known_position() {
        let mut gs = coordinator(1, 4);
        gs.handle_datagram(b"(POS,1,0,0)");
        let out = gs.handle_reached(1, Point::new(3, 3)).unwrap();
        assert_eq!(gs.position(1), Some(Point::new(3, 3)));
        assert_eq!(go_target(&out, 1), Some(Point::new(2, 3)));
    }

    #[test]
    fn unknown_ids_and_out_of_grid_cells_are_ignored() {
        let mut gs = coordinator(2, 2);
        assert!(matches!(
            gs.handle_reached(3, Point::new(0, 0)),
            Err(SwarmError::UnknownAgent(3))
        ));
        assert!(gs.handle_datagram(b"(POS,0,1,1)").is_empty());
        assert!(gs.handle_datagram(b"(\"REACHED\",7,1,1)").is_empty());
        assert!(gs.handle_reached(1, Point::new(2, 0)).unwrap().is_empty());
        assert_eq!(gs.grid().visited_count(), 0);
    }

    #[test]
    fn garbage_and_unknown_contents_are_dropped() {
        let mut gs = coordinator(1, 2);
        assert!(gs.handle_datagram(b"hello").is_empty());
        assert!(gs.handle_datagram(b"(POS,1,x,y)").is_empty());
        assert!(gs.handle_datagram(br#"{"Sender":1,"Content":"WAVE"}"#).is_empty());
        assert!(gs.handle_datagram(br#"{"Sender":1,"Content":"GO","Point":[1,1]}"#).is_empty());
        assert_eq!(gs.grid().visited_count(), 0);
    }

    #[test]
    fn down_is_permanent_and_cuts_links() {
        let mut gs = coordinator(2, 4);
        gs.handle_datagram(b"(POS,1,1,0)");
        gs.handle_datagram(b"(POS,2,2,0)");
        let snapshot = gs.update_connectivity().unwrap();
        assert_eq!(snapshot, "2\nfalse true\ntrue false\ntrue true\n");

        gs.handle_datagram(br#"{"Sender":2,"Content":"DOWN"}"#);
        assert!(gs.is_down(2));
        let snapshot = gs.update_connectivity().unwrap();
        assert_eq!(snapshot, "2\nfalse false\nfalse false\ntrue false\n");

        // new reports from a down drone do not bring it back
        gs.handle_datagram(b"(POS,2,1,1)");
        assert!(gs.update_connectivity().is_none());
        assert!(!gs.connectivity().is_connected(1, 2));
    }

    #[test]
    fn connectivity_is_published_only_on_change() {
        let mut gs = coordinator(1, 2);
        assert!(gs.update_connectivity().is_none());
        gs.handle_datagram(b"(POS,1,0,1)");
        assert!(gs.update_connectivity().is_some());
        assert!(gs.update_connectivity().is_none());
    }

    #[test]
    fn distant_reports_do_not_break_connectivity() {
        let mut gs = coordinator(2, 4);
        gs.handle_datagram(b"(POS,1,2000000000,0)");
        gs.handle_datagram(b"(POS,2,-2000000000,0)");
        assert!(gs.update_connectivity().is_none());
        assert!(!gs.connectivity().is_connected(1, 2));
    }

    #[test]
    fn completion_fires_once() {
        let mut gs = coordinator(2, 1);
        let out = gs.handle_reached(1, Point::new(0, 0)).unwrap();
        assert!(has_success(&out));
        assert!(gs.is_complete());
        assert_eq!(go_target(&out, 1), None);

        let out = gs.handle_reached(2, Point::new(0, 0)).unwrap();
        assert!(!has_success(&out));
        assert!(out.is_empty());
    }

    #[test]
    fn two_by_two_exploration_with_one_drone() {
        let mut gs = coordinator(1, 2);
        let mut drone = DroneState::new(Point::new(0, 0), 1);

        let mut outbound = gs.handle_datagram(b"(POS,1,0,0)");
        let mut cycles = 0;
        let mut success = false;

        while let Some(goal) = go_target(&outbound, 1) {
            cycles += 1;
            drone.assign_goal(goal);
            let arrival = loop {
                if let Some(point) = drone.tick() {
                    break point;
                }
            };
            let token = Token::Reached { id: 1, point: arrival }.to_string();
            outbound = gs.handle_datagram(token.as_bytes());
            success |= has_success(&outbound);
            assert!(cycles <= 3);
        }

        assert_eq!(cycles, 3);
        assert!(success);
        assert!(gs.grid().is_complete());
        assert_eq!(drone.position(), Point::new(0, 1));
    }
}
