//! Mission scenarios: a random mission path across the grid, randomized drone
//! start cells and a failure schedule that can be replayed against a running
//! ground station.

use chrono::{DateTime, Utc};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use crate::core::error::{SwarmError, SwarmResult};
use crate::net::DatagramSink;
use crate::protocol::{AgentId, Message, Point};

/// Drones start within this many cells of the mission start, per axis
pub const START_SPREAD: i32 = 7;

/// Failures are never scheduled before this tick
pub const FIRST_FAILURE_TICK: u32 = 10;

/// Failures are never scheduled in the last ticks of the mission
pub const FAILURE_TAIL_TICKS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioParams {
    pub grid_size: usize,
    pub drones: u32,
    pub failures: u32,
    /// Mission length in ticks; the mission path length when absent
    pub duration: Option<u32>,
}

impl ScenarioParams {
    pub fn validate(&self) -> SwarmResult<()> {
        if self.grid_size == 0 || i32::try_from(self.grid_size).is_err() {
            return Err(SwarmError::ScenarioError(format!(
                "grid size {} is out of range",
                self.grid_size
            )));
        }
        if self.drones == 0 {
            return Err(SwarmError::ScenarioError(
                "at least one drone is required".to_string(),
            ));
        }
        if self.failures > self.drones {
            return Err(SwarmError::ScenarioError(format!(
                "{} failures requested for {} drones",
                self.failures, self.drones
            )));
        }
        if let Some(duration) = self.duration {
            failure_window(duration, self.failures)?;
        }
        Ok(())
    }
}

/// Tick range failures may be scheduled in, checked against the failure count
fn failure_window(duration: u32, failures: u32) -> SwarmResult<(u32, u32)> {
    let last = duration
        .checked_sub(FAILURE_TAIL_TICKS)
        .filter(|last| FIRST_FAILURE_TICK < *last)
        .ok_or_else(|| {
            SwarmError::ScenarioError(format!(
                "duration {} leaves no failure window after tick {}",
                duration, FIRST_FAILURE_TICK
            ))
        })?;
    if failures > last - FIRST_FAILURE_TICK + 1 {
        return Err(SwarmError::ScenarioError(format!(
            "{} failures do not fit in ticks {}..={}",
            failures, FIRST_FAILURE_TICK, last
        )));
    }
    Ok((FIRST_FAILURE_TICK, last))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneLaunch {
    pub id: AgentId,
    pub start: Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub tick: u32,
    pub drone: AgentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub generated_at: DateTime<Utc>,
    pub seed: Option<u64>,
    pub grid_size: usize,
    pub duration: u32,
    pub mission_start: Point,
    pub mission_end: Point,
    /// Cells visited from start to end, both included; one per tick
    pub mission_path: Vec<Point>,
    pub drones: Vec<DroneLaunch>,
    /// Sorted by tick
    pub failures: Vec<FailureEvent>,
}

/// Generate a scenario, seeded for reproducibility when `seed` is given
pub fn generate_seeded(params: &ScenarioParams, seed: Option<u64>) -> SwarmResult<Scenario> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut scenario = generate(params, &mut rng)?;
    scenario.seed = seed;
    Ok(scenario)
}

pub fn generate<R: Rng + ?Sized>(params: &ScenarioParams, rng: &mut R) -> SwarmResult<Scenario> {
    params.validate()?;
    let n = params.grid_size as i32;
    let near = (n / 5).min(n - 1);
    let far = (i64::from(n) * 4 / 5) as i32;

    // start in the lower-left region, end in the upper-right one
    let mission_start = Point::new(rng.random_range(far..=n - 1), rng.random_range(0..=near));
    let mission_end = Point::new(rng.random_range(0..=near), rng.random_range(far..=n - 1));
    let mission_path = random_path(rng, mission_start, mission_end);

    let duration = match params.duration {
        Some(duration) => duration,
        None => u32::try_from(mission_path.len()).map_err(|_| {
            SwarmError::ScenarioError(format!(
                "mission path of {} cells is too long",
                mission_path.len()
            ))
        })?,
    };
    let (first, last) = failure_window(duration, params.failures)?;

    let drones = (1..=params.drones)
        .map(|id| DroneLaunch {
            id,
            start: Point::new(
                spread(rng, mission_start.x, n),
                spread(rng, mission_start.y, n),
            ),
        })
        .collect();

    let amount = params.failures as usize;
    let failed = rand::seq::index::sample(rng, params.drones as usize, amount);
    let ticks = rand::seq::index::sample(rng, (last - first + 1) as usize, amount);

    let mut failures: Vec<FailureEvent> = ticks
        .iter()
        .zip(failed.iter())
        .map(|(tick, drone)| FailureEvent {
            tick: first + tick as u32,
            drone: drone as AgentId + 1,
        })
        .collect();
    failures.sort_by_key(|event| event.tick);

    Ok(Scenario {
        generated_at: Utc::now(),
        seed: None,
        grid_size: params.grid_size,
        duration,
        mission_start,
        mission_end,
        mission_path,
        drones,
        failures,
    })
}

fn spread<R: Rng + ?Sized>(rng: &mut R, center: i32, n: i32) -> i32 {
    let low = (center - START_SPREAD).max(0);
    let high = (center + START_SPREAD).min(n - 1);
    rng.random_range(low..=high)
}

/// Random monotone walk: each step moves one cell closer to `end` on an axis
/// picked at random among those not yet aligned.
fn random_path<R: Rng + ?Sized>(rng: &mut R, start: Point, end: Point) -> Vec<Point> {
    let mut current = start;
    let mut path = vec![current];
    while current != end {
        let along_x = current.x != end.x;
        let along_y = current.y != end.y;
        if along_x && (!along_y || rng.random_bool(0.5)) {
            current.x += (end.x - current.x).signum();
        } else {
            current.y += (end.y - current.y).signum();
        }
        path.push(current);
    }
    path
}

impl Scenario {
    pub fn to_json(&self) -> SwarmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Command lines that launch the ground station and every drone
    pub fn launch_commands(&self, program: &str) -> Vec<String> {
        let mut commands = vec![format!(
            "{} ground-station {} {}",
            program,
            self.drones.len(),
            self.grid_size
        )];
        commands.extend(self.drones.iter().map(|drone| {
            format!(
                "{} drone {} {} {}",
                program, drone.id, drone.start.x, drone.start.y
            )
        }));
        commands
    }
}

/// Replay the failure schedule in real time, one `DOWN` per event.
///
/// Returns the number of reports sent.
pub async fn inject_failures(
    scenario: &Scenario,
    sink: &dyn DatagramSink,
    ground_station: SocketAddr,
    tick: Duration,
) -> SwarmResult<usize> {
    let started = Instant::now();
    let mut sent = 0;

    for event in &scenario.failures {
        sleep_until(started + tick * event.tick).await;
        let payload = Message::down(event.drone).encode()?;
        sink.send_datagram(&payload, ground_station).await?;
        info!("Scenario: tick {}: drone {} is down", event.tick, event.drone);
        sent += 1;
    }

    Ok(sent)
}
