//! Drone agent runtime: message intake, movement and position reporting.
//!
//! The three loops share the [`DroneState`] through one lock that is held only
//! for a read-modify-write. Datagrams are sent after the lock is released.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use super::state::DroneState;
use crate::core::config::{Config, DroneConfig};
use crate::core::error::SwarmResult;
use crate::net::{self, Addressing, DatagramSink};
use crate::protocol::{AgentId, Content, Message, Point, Token, MAX_DATAGRAM_SIZE};
use crate::supervisor::LoopSet;

pub struct DroneAgent {
    id: AgentId,
    state: Mutex<DroneState>,
    socket: UdpSocket,
    sink: Arc<dyn DatagramSink>,
    addressing: Addressing,
    config: DroneConfig,
}

impl DroneAgent {
    /// Bind the drone's listening socket at `base_port + id`
    pub async fn bind(id: AgentId, start: Point, config: &Config) -> SwarmResult<Arc<Self>> {
        let addressing = Addressing::from_config(&config.network);
        let socket = net::bind(addressing.agent(id)?).await?;
        let sink = Arc::new(net::bind_ephemeral(addressing.host()).await?);
        info!("Drone {}: listening on {}", id, socket.local_addr()?);
        Ok(Arc::new(Self::new(id, start, config, socket, sink)))
    }

    pub fn new(
        id: AgentId,
        start: Point,
        config: &Config,
        socket: UdpSocket,
        sink: Arc<dyn DatagramSink>,
    ) -> Self {
        Self {
            id,
            state: Mutex::new(DroneState::new(start, config.drone.speed)),
            socket,
            sink,
            addressing: Addressing::from_config(&config.network),
            config: config.drone.clone(),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Copy of the current runtime state
    pub async fn snapshot(&self) -> DroneState {
        self.state.lock().await.clone()
    }

    /// Run intake, movement and reporting until one of them fails
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut loops = LoopSet::new();

        let agent = self.clone();
        loops.spawn("drone intake", async move { agent.listen().await });
        let agent = self.clone();
        loops.spawn("drone movement", async move { agent.act().await });
        let agent = self.clone();
        loops.spawn("drone reporting", async move { agent.publish().await });

        loops.run().await
    }

    /// Receive loop. A datagram that is not a valid message is fatal.
    pub async fn listen(&self) -> SwarmResult<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (n, from) = net::recv_datagram(&self.socket, &mut buf).await?;
            let message = Message::decode(&buf[..n]).map_err(|err| {
                error!(
                    "Drone {}: undecodable datagram from {}: {:?}",
                    self.id,
                    from,
                    String::from_utf8_lossy(&buf[..n])
                );
                err
            })?;
            self.handle_message(message).await;
        }
    }

    /// Apply a structured command to the runtime state
    pub async fn handle_message(&self, message: Message) {
        info!(
            "Drone {}: received {} {} from {}",
            self.id, message.content, message.point, message.sender
        );
        let mut state = self.state.lock().await;
        match message.content {
            Content::Go => {
                state.assign_goal(message.point);
                info!("Drone {}: heading from {} to {}", self.id, state.position(), message.point);
            }
            Content::Path => {
                debug!("Drone {}: route to ground station {:?}", self.id, message.path);
                state.set_route(message.path);
            }
            other => {
                debug!("Drone {}: ignoring {} message", self.id, other);
            }
        }
    }

    /// Movement loop, one step per tick
    pub async fn act(&self) -> SwarmResult<()> {
        let mut ticker = interval(self.config.move_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.move_tick().await;
        }
    }

    /// One movement tick; reports the arrival to the ground station.
    pub async fn move_tick(&self) -> Option<Point> {
        let arrival = self.state.lock().await.tick();

        if let Some(point) = arrival {
            info!("Drone {}: reached {}", self.id, point);
            let token = Token::Reached { id: self.id, point };
            self.send(token.to_string().as_bytes(), self.addressing.ground_station()).await;
        }
        arrival
    }

    /// Reporting loop
    pub async fn publish(&self) -> SwarmResult<()> {
        let mut ticker = interval(self.config.report_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.report_position().await;
        }
    }

    /// Broadcast the current position to the collector and the ground station
    pub async fn report_position(&self) {
        let point = self.state.lock().await.position();
        let token = Token::Position { id: self.id, point }.to_string();

        self.send(token.as_bytes(), self.addressing.collector()).await;
        self.send(token.as_bytes(), self.addressing.ground_station()).await;
    }

    async fn send(&self, payload: &[u8], target: std::net::SocketAddr) {
        if let Err(e) = self.sink.send_datagram(payload, target).await {
            warn!("Drone {}: {}", self.id, e);
        }
    }
}
