//! Ground station runtime: datagram intake and the connectivity loop.

use anyhow::Result;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use super::coordinator::{Coordinator, Outbound};
use super::grid::Grid;
use crate::core::config::{Config, GroundStationConfig};
use crate::core::error::SwarmResult;
use crate::net::{self, Addressing, DatagramSink};
use crate::protocol::MAX_DATAGRAM_SIZE;
use crate::supervisor::LoopSet;

pub struct GroundStation {
    coordinator: Mutex<Coordinator>,
    socket: UdpSocket,
    sink: Arc<dyn DatagramSink>,
    addressing: Addressing,
    config: GroundStationConfig,
}

impl GroundStation {
    /// Bind the ground station at `base_port`
    pub async fn bind(
        total_drones: u32,
        grid_size: usize,
        config: &Config,
    ) -> SwarmResult<Arc<Self>> {
        config.check_swarm_size(total_drones)?;
        Grid::check_size(grid_size)?;
        let addressing = Addressing::from_config(&config.network);
        let socket = net::bind(addressing.ground_station()).await?;
        let sink = Arc::new(net::bind_ephemeral(addressing.host()).await?);
        info!(
            "Ground station: listening on {} for {} drones over a {}x{} grid",
            socket.local_addr()?,
            total_drones,
            grid_size,
            grid_size
        );
        Ok(Arc::new(Self::new(
            total_drones as usize,
            grid_size,
            config,
            socket,
            sink,
        )))
    }

    pub fn new(
        total_drones: usize,
        grid_size: usize,
        config: &Config,
        socket: UdpSocket,
        sink: Arc<dyn DatagramSink>,
    ) -> Self {
        Self {
            coordinator: Mutex::new(Coordinator::new(
                total_drones,
                grid_size,
                &config.ground_station,
            )),
            socket,
            sink,
            addressing: Addressing::from_config(&config.network),
            config: config.ground_station.clone(),
        }
    }

    pub fn coordinator(&self) -> &Mutex<Coordinator> {
        &self.coordinator
    }

    /// Run intake and connectivity until one of them fails
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut loops = LoopSet::new();

        let station = self.clone();
        loops.spawn("ground station intake", async move { station.listen().await });
        let station = self.clone();
        loops.spawn("ground station connectivity", async move {
            station.watch_connectivity().await
        });

        loops.run().await
    }

    /// Receive loop for position broadcasts, arrival and failure reports
    pub async fn listen(&self) -> SwarmResult<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match net::recv_datagram(&self.socket, &mut buf).await {
                Ok((n, _)) => self.process_datagram(&buf[..n]).await,
                Err(e) => warn!("Ground station: {}", e),
            }
        }
    }

    /// Apply one datagram and send whatever it produced
    pub async fn process_datagram(&self, bytes: &[u8]) {
        let outbound = self.coordinator.lock().await.handle_datagram(bytes);
        self.dispatch(outbound).await;
    }

    /// Connectivity loop
    pub async fn watch_connectivity(&self) -> SwarmResult<()> {
        let mut ticker = interval(self.config.connectivity_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.connectivity_tick().await;
        }
    }

    /// Recompute connectivity and publish the snapshot if it changed
    pub async fn connectivity_tick(&self) -> bool {
        let snapshot = self.coordinator.lock().await.update_connectivity();
        match snapshot {
            Some(text) => {
                debug!("Ground station: connectivity changed");
                self.send(text.as_bytes(), self.addressing.collector()).await;
                true
            }
            None => false,
        }
    }

    async fn dispatch(&self, outbound: Vec<Outbound>) {
        for out in outbound {
            match out {
                Outbound::ToDrone(id, message) => {
                    let target = match self.addressing.agent(id) {
                        Ok(target) => target,
                        Err(e) => {
                            warn!("Ground station: {}", e);
                            continue;
                        }
                    };
                    match message.encode() {
                        Ok(payload) => self.send(&payload, target).await,
                        Err(e) => warn!("Ground station: {}", e),
                    }
                }
                Outbound::ToCollector(text) => {
                    self.send(text.as_bytes(), self.addressing.collector()).await;
                }
            }
        }
    }

    async fn send(&self, payload: &[u8], target: SocketAddr) {
        if let Err(e) = self.sink.send_datagram(payload, target).await {
            warn!("Ground station: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::MemorySink;
    use crate::protocol::{Content, Message, Point};
    use std::net::{IpAddr, Ipv4Addr};

    async fn station_with_sink(
        drones: usize,
        grid: usize,
    ) -> (GroundStation, Arc<MemorySink>, Config) {
        let config = Config::for_testing(10000, 9999);
        let socket = net::bind_ephemeral(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        let sink = Arc::new(MemorySink::default());
        let station = GroundStation::new(drones, grid, &config, socket, sink.clone());
        (station, sink, config)
    }

    #[tokio::test]
    async fn go_is_sent_to_the_drone_port() {
        let (station, sink, _) = station_with_sink(2, 3).await;
        station.process_datagram(b"(POS,2,0,0)").await;

        let sent = sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.port(), 10002);
        let message = Message::decode(&sent[0].1).unwrap();
        assert_eq!(message.content, Content::Go);
        assert_eq!(message.point, Point::new(1, 0));
    }

    #[tokio::test]
    async fn success_goes_to_the_collector() {
        let (station, sink, _) = station_with_sink(1, 1).await;
        station.process_datagram(b"(\"REACHED\",1,0,0)").await;

        let sent = sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.port(), 9999);
        assert_eq!(sent[0].1, b"SUCCESS".to_vec());
    }

    #[tokio::test]
    async fn snapshot_is_posted_only_on_change() {
        let (station, sink, _) = station_with_sink(1, 4).await;
        assert!(!station.connectivity_tick().await);

        station.coordinator().lock().await.record_position(1, Point::new(3, 3)).unwrap();
        sink.take();

        assert!(station.connectivity_tick().await);
        assert!(!station.connectivity_tick().await);

        let sent = sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.port(), 9999);
        assert_eq!(sent[0].1, b"1\nfalse\ntrue\n".to_vec());
    }
}
