//! The ground station's connectivity view of the swarm.
//!
//! Node 0 is the ground station, nodes `1..=n` are drones. A link exists when
//! both ends are up and strictly closer than the connectivity radius.

use std::fmt::Write;

use crate::protocol::{AgentId, Point};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityMatrix {
    drones: usize,
    links: Vec<bool>,
}

impl ConnectivityMatrix {
    /// Matrix for `drones` drones plus the ground station, all links down
    pub fn new(drones: usize) -> Self {
        let nodes = drones + 1;
        Self {
            drones,
            links: vec![false; nodes * nodes],
        }
    }

    pub fn drones(&self) -> usize {
        self.drones
    }

    fn index(&self, a: usize, b: usize) -> usize {
        a * (self.drones + 1) + b
    }

    pub fn is_connected(&self, a: AgentId, b: AgentId) -> bool {
        let (a, b) = (a as usize, b as usize);
        if a > self.drones || b > self.drones {
            return false;
        }
        self.links[self.index(a, b)]
    }

    fn set(&mut self, a: usize, b: usize, connected: bool) -> bool {
        let ab = self.index(a, b);
        let ba = self.index(b, a);
        let changed = self.links[ab] != connected;
        self.links[ab] = connected;
        self.links[ba] = connected;
        changed
    }

    /// Recompute every link.
    ///
    /// `positions` and `down` are indexed by agent id; slot 0 belongs to the
    /// ground station, which sits at `station` and is never down. A drone
    /// without a known position has no links. Returns whether any link changed.
    pub fn update(
        &mut self,
        station: Point,
        positions: &[Option<Point>],
        down: &[bool],
        radius: f64,
    ) -> bool {
        let up_at = |id: usize| -> Option<Point> {
            if id == 0 {
                return Some(station);
            }
            if down.get(id).copied().unwrap_or(true) {
                return None;
            }
            positions.get(id).copied().flatten()
        };

        let mut changed = false;
        for a in 0..=self.drones {
            for b in (a + 1)..=self.drones {
                let connected = match (up_at(a), up_at(b)) {
                    (Some(pa), Some(pb)) => pa.distance(&pb) < radius,
                    _ => false,
                };
                changed |= self.set(a, b, connected);
            }
        }
        changed
    }

    /// Visualizer snapshot of the drone-to-drone links followed by the
    /// ground-station link row. Down drones show no links.
    pub fn snapshot_text(&self, down: &[bool]) -> String {
        let is_down = |id: usize| down.get(id).copied().unwrap_or(false);

        let mut text = String::new();
        let _ = writeln!(text, "{}", self.drones);
        for i in 1..=self.drones {
            let links = (1..=self.drones)
                .map(|j| !is_down(i) && !is_down(j) && self.links[self.index(i, j)]);
            let _ = writeln!(text, "{}", render_row(links));
        }
        let station_links =
            (1..=self.drones).map(|i| !is_down(i) && self.links[self.index(0, i)]);
        let _ = writeln!(text, "{}", render_row(station_links));
        text
    }
}

fn render_row(links: impl Iterator<Item = bool>) -> String {
    links
        .map(|connected| if connected { "true" } else { "false" })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: f64 = 10.0;

    fn assert_symmetric(matrix: &ConnectivityMatrix) {
        let n = matrix.drones() as AgentId;
        for a in 0..=n {
            assert!(!matrix.is_connected(a, a));
            for b in 0..=n {
                assert_eq!(matrix.is_connected(a, b), matrix.is_connected(b, a));
            }
        }
    }

    #[test]
    fn links_within_radius_only() {
        let mut matrix = ConnectivityMatrix::new(3);
        let positions = [
            None,
            Some(Point::new(3, 4)),
            Some(Point::new(3, 13)),
            Some(Point::new(40, 40)),
        ];
        let down = [false; 4];

        assert!(matrix.update(Point::new(0, 0), &positions, &down, RADIUS));
        assert!(matrix.is_connected(0, 1));
        assert!(matrix.is_connected(1, 2));
        assert!(!matrix.is_connected(0, 2));
        assert!(!matrix.is_connected(0, 3));
        assert!(!matrix.is_connected(2, 3));
        assert_symmetric(&matrix);
    }

    #[test]
    fn radius_boundary_is_exclusive() {
        let mut matrix = ConnectivityMatrix::new(1);
        let positions = [None, Some(Point::new(6, 8))];
        assert!(!matrix.update(Point::new(0, 0), &positions, &[false; 2], RADIUS));
        assert!(!matrix.is_connected(0, 1));
    }

    #[test]
    fn extreme_coordinates_are_measured_without_wrapping() {
        let mut matrix = ConnectivityMatrix::new(3);
        let positions = [
            None,
            Some(Point::new(i32::MAX, i32::MAX)),
            Some(Point::new(i32::MIN, i32::MIN)),
            Some(Point::new(i32::MAX - 3, i32::MAX - 4)),
        ];
        assert!(matrix.update(Point::new(0, 0), &positions, &[false; 4], RADIUS));
        assert!(!matrix.is_connected(1, 2));
        assert!(!matrix.is_connected(0, 1));
        assert!(!matrix.is_connected(0, 2));
        assert!(matrix.is_connected(1, 3));
        assert_symmetric(&matrix);
    }

    #[test]
    fn unchanged_update_reports_no_change() {
        let mut matrix = ConnectivityMatrix::new(2);
        let positions = [None, Some(Point::new(1, 1)), Some(Point::new(2, 2))];
        let down = [false; 3];
        assert!(matrix.update(Point::new(0, 0), &positions, &down, RADIUS));
        assert!(!matrix.update(Point::new(0, 0), &positions, &down, RADIUS));
    }

    #[test]
    fn down_drones_lose_all_links() {
        let mut matrix = ConnectivityMatrix::new(2);
        let positions = [None, Some(Point::new(1, 1)), Some(Point::new(2, 2))];
        matrix.update(Point::new(0, 0), &positions, &[false; 3], RADIUS);
        assert!(matrix.is_connected(1, 2));

        assert!(matrix.update(Point::new(0, 0), &positions, &[false, true, false], RADIUS));
        assert!(!matrix.is_connected(0, 1));
        assert!(!matrix.is_connected(1, 2));
        assert!(matrix.is_connected(0, 2));
        assert_symmetric(&matrix);
    }

    #[test]
    fn unknown_positions_are_disconnected() {
        let mut matrix = ConnectivityMatrix::new(2);
        let positions = [None, None, Some(Point::new(0, 1))];
        matrix.update(Point::new(0, 0), &positions, &[false; 3], RADIUS);
        assert!(!matrix.is_connected(0, 1));
        assert!(!matrix.is_connected(1, 2));
        assert!(matrix.is_connected(0, 2));
    }

    #[test]
    fn snapshot_format() {
        let mut matrix = ConnectivityMatrix::new(3);
        let positions = [
            None,
            Some(Point::new(1, 0)),
            Some(Point::new(2, 0)),
            Some(Point::new(50, 50)),
        ];
        let down = [false, false, false, false];
        matrix.update(Point::new(0, 0), &positions, &down, RADIUS);

        assert_eq!(
            matrix.snapshot_text(&down),
            "3\n\
             false true false\n\
             true false false\n\
             false false false\n\
             true true false\n"
        );
    }

    #[test]
    fn snapshot_masks_down_drones() {
        let mut matrix = ConnectivityMatrix::new(2);
        let positions = [None, Some(Point::new(1, 0)), Some(Point::new(2, 0))];
        matrix.update(Point::new(0, 0), &positions, &[false; 3], RADIUS);

        let text = matrix.snapshot_text(&[false, false, true]);
        assert_eq!(text, "2\nfalse false\nfalse false\ntrue false\n");
    }

    #[test]
    fn out_of_range_ids_are_not_connected() {
        let matrix = ConnectivityMatrix::new(1);
        assert!(!matrix.is_connected(0, 5));
    }
}
