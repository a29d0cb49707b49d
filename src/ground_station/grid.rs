//! Exploration grid and frontier search.

use std::collections::VecDeque;

use crate::core::error::{SwarmError, SwarmResult};
use crate::protocol::Point;

/// Largest grid the ground station tracks, in cells
pub const MAX_CELLS: usize = 1 << 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Unvisited,
    Visited,
}

/// Neighbour expansion order of the frontier search
const DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// `size × size` exploration grid. Cell `(i, j)` is the point `Point { x: i, y: j }`.
#[derive(Debug, Clone)]
pub struct Grid {
    size: usize,
    cells: Vec<CellState>,
    visited_count: usize,
}

impl Grid {
    /// Check that a `size × size` grid is non-empty, addressable by `Point`
    /// and within `MAX_CELLS`.
    pub fn check_size(size: usize) -> SwarmResult<()> {
        if size == 0 {
            return Err(SwarmError::GridError("the grid needs at least one cell".to_string()));
        }
        let cells = i32::try_from(size)
            .ok()
            .and_then(|_| size.checked_mul(size))
            .filter(|cells| *cells <= MAX_CELLS);
        if cells.is_none() {
            return Err(SwarmError::GridError(format!(
                "a {}x{} grid exceeds {} cells",
                size, size, MAX_CELLS
            )));
        }
        Ok(())
    }

    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![CellState::Unvisited; size * size],
            visited_count: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, cell: Point) -> Option<usize> {
        let i = usize::try_from(cell.x).ok()?;
        let j = usize::try_from(cell.y).ok()?;
        (i < self.size && j < self.size).then_some(i * self.size + j)
    }

    pub fn contains(&self, cell: Point) -> bool {
        self.index(cell).is_some()
    }

    pub fn state(&self, cell: Point) -> Option<CellState> {
        self.index(cell).map(|idx| self.cells[idx])
    }

    /// Mark a cell visited. Returns `true` only on the `Unvisited → Visited` transition.
    pub fn mark_visited(&mut self, cell: Point) -> bool {
        let Some(idx) = self.index(cell) else {
            return false;
        };
        if self.cells[idx] == CellState::Visited {
            return false;
        }
        self.cells[idx] = CellState::Visited;
        self.visited_count += 1;
        true
    }

    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    pub fn is_complete(&self) -> bool {
        self.visited_count == self.cells.len()
    }

    /// First unvisited cell in breadth-first order from `origin`.
    ///
    /// Returns `None` when `origin` lies outside the grid or every reachable
    /// cell has been visited.
    pub fn closest_unvisited(&self, origin: Point) -> Option<Point> {
        let start = self.index(origin)?;
        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        seen[start] = true;
        queue.push_back(origin);

        while let Some(cell) = queue.pop_front() {
            if self.state(cell) != Some(CellState::Visited) {
                return Some(cell);
            }
            for (di, dj) in DIRECTIONS {
                let next = Point::new(cell.x + di, cell.y + dj);
                let Some(idx) = self.index(next) else {
                    continue;
                };
                if seen[idx] {
                    continue;
                }
                seen[idx] = true;
                queue.push_back(next);
            }
        }

        None
    }
}
