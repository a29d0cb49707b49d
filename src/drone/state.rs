//! Drone runtime state and its motion state machine.
//!
//! `Idle --GO(p)--> Moving --position == goal--> Idle`
//!
//! Movement resolves one axis at a time: the first coordinate until it matches
//! the goal, then the second, advancing `speed` cells per step and snapping
//! onto the goal coordinate instead of overshooting it.

use crate::protocol::{AgentId, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DronePhase {
    /// No goal is active
    Idle,
    /// Travelling towards the goal
    Moving,
}

#[derive(Debug, Clone)]
pub struct DroneState {
    position: Point,
    goal: Point,
    speed: i32,
    stopped: bool,
    route: Vec<AgentId>,
}

impl DroneState {
    /// New idle drone whose goal is its starting position
    pub fn new(start: Point, speed: i32) -> Self {
        Self {
            position: start,
            goal: start,
            speed,
            stopped: true,
            route: Vec::new(),
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn goal(&self) -> Point {
        self.goal
    }

    pub fn route(&self) -> &[AgentId] {
        &self.route
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn phase(&self) -> DronePhase {
        if self.stopped {
            DronePhase::Idle
        } else {
            DronePhase::Moving
        }
    }

    /// Handle a `GO` command
    pub fn assign_goal(&mut self, goal: Point) {
        self.goal = goal;
        self.stopped = false;
    }

    /// Handle a `PATH` command
    pub fn set_route(&mut self, hops: Vec<AgentId>) {
        self.route = hops;
    }

    /// Advance one step along the active axis
    pub fn step(&mut self) {
        if self.position.x != self.goal.x {
            self.position.x = advance(self.position.x, self.goal.x, self.speed);
        } else if self.position.y != self.goal.y {
            self.position.y = advance(self.position.y, self.goal.y, self.speed);
        }
    }

    /// If the goal has been reached, stop and return the arrival point.
    ///
    /// Returns `None` while idle, so a goal is reported exactly once.
    pub fn check_arrival(&mut self) -> Option<Point> {
        if self.stopped || self.position != self.goal {
            return None;
        }
        self.stopped = true;
        Some(self.position)
    }

    /// One move tick: a step followed by an arrival check.
    pub fn tick(&mut self) -> Option<Point> {
        if self.stopped {
            return None;
        }
        self.step();
        self.check_arrival()
    }
}

fn advance(current: i32, target: i32, speed: i32) -> i32 {
    let remaining = i64::from(target) - i64::from(current);
    if remaining.abs() < i64::from(speed) {
        target
    } else {
        let next = i64::from(current) + i64::from(speed) * remaining.signum();
        i32::try_from(next).unwrap_or(target)
    }
}
