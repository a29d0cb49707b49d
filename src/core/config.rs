use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use crate::core::error::SwarmError;
use crate::protocol::Point;

/// Prefix for environment overrides, e.g. `DRONENET__NETWORK__BASE_PORT=20000`
pub const ENV_PREFIX: &str = "DRONENET";

/// Top-level configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Addressing of every process in the swarm
    pub network: NetworkConfig,

    /// Drone agent timing and motion
    pub drone: DroneConfig,

    /// Ground station coordinator settings
    pub ground_station: GroundStationConfig,

    /// Network simulator settings
    pub simulator: SimulatorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Loopback addressing shared by all processes
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Host every socket binds to and sends to
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Ground station port; drone `id` listens on `base_port + id`
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// External collector / visualizer port
    #[serde(default = "default_collector_port")]
    pub collector_port: u16,
}

/// Drone agent configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DroneConfig {
    /// Cells advanced per move tick
    #[serde(default = "default_speed")]
    pub speed: i32,

    /// Move tick in milliseconds
    #[serde(default = "default_drone_interval_ms")]
    pub move_interval_ms: u64,

    /// Position report interval in milliseconds
    #[serde(default = "default_drone_interval_ms")]
    pub report_interval_ms: u64,

    /// Delay before binding, to let the other processes come up
    #[serde(default = "default_drone_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

/// Ground station configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GroundStationConfig {
    /// Connectivity recomputation period in milliseconds
    #[serde(default = "default_connectivity_interval_ms")]
    pub connectivity_interval_ms: u64,

    /// Agents strictly closer than this are linked
    #[serde(default = "default_connectivity_radius")]
    pub connectivity_radius: f64,

    /// Fixed position of the ground station (node 0)
    #[serde(default)]
    pub position: Point,

    /// Delay between binding and starting the loops
    #[serde(default = "default_station_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

/// Network simulator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    /// Port the simulator listens on for position broadcasts
    #[serde(default = "default_collector_port")]
    pub listen_port: u16,

    /// Graph recomputation period in milliseconds
    #[serde(default = "default_simulator_interval_ms")]
    pub update_interval_ms: u64,

    /// Agents at most this far apart are linked
    #[serde(default = "default_connectivity_radius")]
    pub connectivity_radius: f64,

    /// Position of node 0 in the simulator's view
    #[serde(default)]
    pub ground_station_position: [f64; 2],

    /// Samples for drone ids above this are dropped
    #[serde(default = "default_simulator_max_drones")]
    pub max_drones: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Level filter name (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values for optional configuration
fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_base_port() -> u16 {
    10000
}

fn default_collector_port() -> u16 {
    9999
}

fn default_speed() -> i32 {
    1
}

fn default_drone_interval_ms() -> u64 {
    1000
}

fn default_drone_startup_delay_ms() -> u64 {
    2000
}

fn default_connectivity_interval_ms() -> u64 {
    25
}

fn default_connectivity_radius() -> f64 {
    10.0
}

fn default_station_startup_delay_ms() -> u64 {
    1000
}

fn default_simulator_interval_ms() -> u64 {
    1000
}

fn default_simulator_max_drones() -> u32 {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            base_port: default_base_port(),
            collector_port: default_collector_port(),
        }
    }
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            move_interval_ms: default_drone_interval_ms(),
            report_interval_ms: default_drone_interval_ms(),
            startup_delay_ms: default_drone_startup_delay_ms(),
        }
    }
}

impl Default for GroundStationConfig {
    fn default() -> Self {
        Self {
            connectivity_interval_ms: default_connectivity_interval_ms(),
            connectivity_radius: default_connectivity_radius(),
            position: Point::default(),
            startup_delay_ms: default_station_startup_delay_ms(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            listen_port: default_collector_port(),
            update_interval_ms: default_simulator_interval_ms(),
            connectivity_radius: default_connectivity_radius(),
            ground_station_position: [0.0, 0.0],
            max_drones: default_simulator_max_drones(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DroneConfig {
    pub fn move_interval(&self) -> Duration {
        Duration::from_millis(self.move_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

impl GroundStationConfig {
    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_millis(self.connectivity_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

impl SimulatorConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Config {
    /// Load configuration from an optional TOML file layered with
    /// `DRONENET__SECTION__KEY` environment overrides.
    ///
    /// A missing file is not an error: every field has a default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to assemble configuration from {:?}", path))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, without environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&config_text)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the protocol loops cannot run with
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.drone.speed <= 0 {
            return Err(SwarmError::ConfigError(format!(
                "drone.speed must be positive, got {}",
                self.drone.speed
            )));
        }

        let intervals = [
            ("drone.move_interval_ms", self.drone.move_interval_ms),
            ("drone.report_interval_ms", self.drone.report_interval_ms),
            (
                "ground_station.connectivity_interval_ms",
                self.ground_station.connectivity_interval_ms,
            ),
            ("simulator.update_interval_ms", self.simulator.update_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(SwarmError::ConfigError(format!("{} must be positive", name)));
            }
        }

        let radii = [
            ("ground_station.connectivity_radius", self.ground_station.connectivity_radius),
            ("simulator.connectivity_radius", self.simulator.connectivity_radius),
        ];
        for (name, value) in radii {
            if !(value.is_finite() && value > 0.0) {
                return Err(SwarmError::ConfigError(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.simulator.max_drones == 0 {
            return Err(SwarmError::ConfigError(
                "simulator.max_drones must be positive".to_string(),
            ));
        }

        if self.network.base_port == u16::MAX {
            return Err(SwarmError::ConfigError(
                "network.base_port leaves no room for drone ports".to_string(),
            ));
        }

        Ok(())
    }

    /// Ensure every drone id up to `total_drones` maps onto a valid port
    pub fn check_swarm_size(&self, total_drones: u32) -> Result<(), SwarmError> {
        let highest = u32::from(self.network.base_port) + total_drones;
        if highest > u32::from(u16::MAX) {
            return Err(SwarmError::ConfigError(format!(
                "{} drones do not fit above base port {}",
                total_drones, self.network.base_port
            )));
        }
        Ok(())
    }

    /// Configuration with short intervals and no startup delays, for tests
    pub fn for_testing(base_port: u16, collector_port: u16) -> Self {
        let mut config = Self::default();
        config.network.base_port = base_port;
        config.network.collector_port = collector_port;
        config.drone.move_interval_ms = 10;
        config.drone.report_interval_ms = 10;
        config.drone.startup_delay_ms = 0;
        config.ground_station.connectivity_interval_ms = 5;
        config.ground_station.startup_delay_ms = 0;
        config.simulator.listen_port = collector_port;
        config.simulator.update_interval_ms = 20;
        config
    }
}
