//! Network simulator: position intake, connectivity tracking and route
//! distribution.

use anyhow::Result;
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use super::graph::{ConnectivityGraph, Position};
use crate::core::config::{Config, SimulatorConfig};
use crate::core::error::SwarmResult;
use crate::net::{self, Addressing, DatagramSink};
use crate::protocol::{AgentId, Message, GROUND_STATION_ID, MAX_DATAGRAM_SIZE};
use crate::supervisor::LoopSet;

/// Parse a position broadcast: `(POS,id,x,y)` or a bare `id,x,y` triple.
/// Coordinates may be fractional.
pub fn parse_position_sample(text: &str) -> Option<(AgentId, Position)> {
    let text = text.trim();
    let body = match text.strip_prefix("(POS,") {
        Some(rest) => rest.strip_suffix(')')?,
        None => text,
    };

    let mut fields = body.split(',').map(str::trim);
    let id: AgentId = fields.next()?.parse().ok()?;
    let x: f64 = fields.next()?.parse().ok()?;
    let y: f64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some((id, [x, y]))
}

/// Position table and the last computed graph
pub struct Simulator {
    positions: BTreeMap<AgentId, Position>,
    graph: ConnectivityGraph,
    radius: f64,
    max_drones: AgentId,
}

impl Simulator {
    /// The ground station is seeded as node 0 at its configured position
    pub fn new(config: &SimulatorConfig) -> Self {
        let mut positions = BTreeMap::new();
        positions.insert(GROUND_STATION_ID, config.ground_station_position);
        Self {
            positions,
            graph: ConnectivityGraph::default(),
            radius: config.connectivity_radius,
            max_drones: config.max_drones,
        }
    }

    pub fn position(&self, id: AgentId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    /// Store a sample from a raw datagram. Returns whether it was accepted.
    pub fn record_sample(&mut self, bytes: &[u8]) -> bool {
        let text = String::from_utf8_lossy(bytes);
        match parse_position_sample(&text) {
            Some((GROUND_STATION_ID, _)) => {
                debug!("Simulator: ignoring sample for the ground station");
                false
            }
            Some((id, _)) if id > self.max_drones => {
                debug!("Simulator: ignoring sample for drone {} above {}", id, self.max_drones);
                false
            }
            Some((id, position)) => {
                self.positions.insert(id, position);
                true
            }
            None => {
                debug!("Simulator: dropping invalid sample {:?}", text);
                false
            }
        }
    }

    /// Rebuild the graph; returns whether it differs from the previous one.
    pub fn update_connectivity(&mut self) -> bool {
        let graph = ConnectivityGraph::build(&self.positions, self.radius);
        if graph == self.graph {
            return false;
        }
        info!(
            "Simulator: connectivity changed ({} links among {} nodes)",
            graph.edge_count(),
            self.positions.len()
        );
        self.graph = graph;
        true
    }

    /// `PATH` messages for every drone reachable from the ground station
    pub fn route_messages(&self) -> Vec<(AgentId, Message)> {
        self.graph
            .shortest_paths(GROUND_STATION_ID)
            .into_iter()
            .filter(|(id, _)| *id != GROUND_STATION_ID)
            .map(|(id, route)| (id, Message::path(route)))
            .collect()
    }

    /// One update pass: the routes to distribute, empty when nothing changed
    pub fn tick(&mut self) -> Vec<(AgentId, Message)> {
        if self.update_connectivity() {
            self.route_messages()
        } else {
            Vec::new()
        }
    }
}

/// Simulator process: sample intake plus the periodic update loop
pub struct SimulatorService {
    simulator: Mutex<Simulator>,
    socket: UdpSocket,
    sink: Arc<dyn DatagramSink>,
    addressing: Addressing,
    config: SimulatorConfig,
}

impl SimulatorService {
    pub async fn bind(config: &Config) -> SwarmResult<Arc<Self>> {
        let addressing = Addressing::from_config(&config.network);
        let socket = net::bind(addressing.at_port(config.simulator.listen_port)).await?;
        let sink = Arc::new(net::bind_ephemeral(addressing.host()).await?);
        info!("Simulator: listening for positions on {}", socket.local_addr()?);
        Ok(Arc::new(Self::new(config, socket, sink)))
    }

    pub fn new(config: &Config, socket: UdpSocket, sink: Arc<dyn DatagramSink>) -> Self {
        Self {
            simulator: Mutex::new(Simulator::new(&config.simulator)),
            socket,
            sink,
            addressing: Addressing::from_config(&config.network),
            config: config.simulator.clone(),
        }
    }

    pub fn simulator(&self) -> &Mutex<Simulator> {
        &self.simulator
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut loops = LoopSet::new();

        let service = self.clone();
        loops.spawn("simulator intake", async move { service.listen().await });
        let service = self.clone();
        loops.spawn("simulator update", async move { service.update().await });

        loops.run().await
    }

    pub async fn listen(&self) -> SwarmResult<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match net::recv_datagram(&self.socket, &mut buf).await {
                Ok((n, _)) => {
                    self.simulator.lock().await.record_sample(&buf[..n]);
                }
                Err(e) => warn!("Simulator: {}", e),
            }
        }
    }

    pub async fn update(&self) -> SwarmResult<()> {
        let mut ticker = interval(self.config.update_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.update_tick().await;
        }
    }

    /// One pass of the update loop; returns the number of routes sent.
    pub async fn update_tick(&self) -> usize {
        let routes = self.simulator.lock().await.tick();
        self.send_routes(routes).await
    }

    async fn send_routes(&self, routes: Vec<(AgentId, Message)>) -> usize {
        let sends = routes
            .into_iter()
            .map(|(id, message)| self.send_route(id, message));

        let mut sent = 0;
        for result in join_all(sends).await {
            match result {
                Ok(()) => sent += 1,
                Err(e) => warn!("Simulator: {}", e),
            }
        }
        sent
    }

    async fn send_route(&self, id: AgentId, message: Message) -> SwarmResult<()> {
        let target = self.addressing.agent(id)?;
        let payload = message.encode()?;
        debug!("Simulator: route for drone {}: {:?}", id, message.path);
        self.sink.send_datagram(&payload, target).await
    }
}
