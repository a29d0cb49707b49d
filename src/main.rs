use anyhow::{anyhow, ensure, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use std::path::PathBuf;

use dronenet::core::config::Config;
use dronenet::drone::DroneAgent;
use dronenet::ground_station::GroundStation;
use dronenet::net::{self, Addressing};
use dronenet::protocol::Point;
use dronenet::scenario::{self, ScenarioParams};
use dronenet::simulator::SimulatorService;

#[derive(Parser)]
#[clap(
    author,
    version,
    about = "Grid exploration with a drone swarm, its ground station and a network simulator"
)]
struct Cli {
    /// Path to config file
    #[clap(short, long, default_value = "dronenet.toml", global = true)]
    config: PathBuf,

    /// Debug mode
    #[clap(short, long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a drone listening on base_port + id
    #[clap(allow_negative_numbers = true)]
    Drone {
        /// Drone id, starting at 1
        id: u32,
        /// Starting row
        x: i32,
        /// Starting column
        y: i32,
    },

    /// Run the ground station coordinating the exploration
    GroundStation {
        total_drones: u32,
        grid_size: usize,
    },

    /// Run the network simulator distributing routes to the drones
    Simulator,

    /// Generate a mission scenario and optionally replay its failures
    Scenario {
        #[clap(long)]
        grid_size: usize,
        #[clap(long)]
        drones: u32,
        #[clap(long, default_value_t = 0)]
        failures: u32,
        /// Mission length in drone move ticks [default: mission path length]
        #[clap(long)]
        duration: Option<u32>,
        #[clap(long)]
        seed: Option<u64>,
        /// Send the scheduled DOWN reports to the ground station
        #[clap(long)]
        inject: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(Some(cli.config.as_path()))?;

    let log_level = if cli.debug {
        LevelFilter::Debug
    } else {
        config
            .logging
            .level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("Invalid log level: {}", config.logging.level))?
    };
    env_logger::Builder::new().filter_level(log_level).init();

    match cli.command {
        Command::Drone { id, x, y } => run_drone(&config, id, Point::new(x, y)).await,
        Command::GroundStation {
            total_drones,
            grid_size,
        } => run_ground_station(&config, total_drones, grid_size).await,
        Command::Simulator => run_simulator(&config).await,
        Command::Scenario {
            grid_size,
            drones,
            failures,
            duration,
            seed,
            inject,
        } => {
            let params = ScenarioParams {
                grid_size,
                drones,
                failures,
                duration,
            };
            run_scenario(&config, &params, seed, inject).await
        }
    }
}

async fn run_drone(config: &Config, id: u32, start: Point) -> Result<()> {
    ensure!(id != 0, "Drone ids start at 1; 0 is the ground station");
    config.check_swarm_size(id)?;

    let agent = DroneAgent::bind(id, start, config)
        .await
        .with_context(|| format!("Failed to start drone {}", id))?;
    tokio::time::sleep(config.drone.startup_delay()).await;

    info!("Drone {}: starting at {}", id, start);
    agent.run().await
}

async fn run_ground_station(
    config: &Config,
    total_drones: u32,
    grid_size: usize,
) -> Result<()> {
    ensure!(total_drones > 0, "The ground station needs at least one drone");

    let station = GroundStation::bind(total_drones, grid_size, config)
        .await
        .context("Failed to start the ground station")?;
    tokio::time::sleep(config.ground_station.startup_delay()).await;

    info!("Ground station: exploration started");
    station.run().await
}

async fn run_simulator(config: &Config) -> Result<()> {
    let service = SimulatorService::bind(config)
        .await
        .context("Failed to start the simulator")?;
    service.run().await
}

async fn run_scenario(
    config: &Config,
    params: &ScenarioParams,
    seed: Option<u64>,
    inject: bool,
) -> Result<()> {
    let mission = scenario::generate_seeded(params, seed)?;

    println!("{}", mission.to_json()?);
    for command in mission.launch_commands(env!("CARGO_PKG_NAME")) {
        println!("{}", command);
    }

    if inject {
        let addressing = Addressing::from_config(&config.network);
        let sink = net::bind_ephemeral(addressing.host()).await?;
        let sent = scenario::inject_failures(
            &mission,
            &sink,
            addressing.ground_station(),
            config.drone.move_interval(),
        )
        .await
        .context("Failed to inject failures")?;
        info!("Scenario: injected {} failures", sent);
    }

    Ok(())
}
