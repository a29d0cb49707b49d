//! Loopback addressing and datagram plumbing.
//!
//! Drone `id` listens on `host:(base_port + id)`, the ground station on
//! `host:base_port` and the external collector on `host:collector_port`.

use async_trait::async_trait;
use log::warn;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;

use crate::core::config::NetworkConfig;
use crate::core::error::{SwarmError, SwarmResult};
use crate::protocol::{AgentId, MAX_DATAGRAM_SIZE};

/// Deterministic address derivation for every process in the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    host: IpAddr,
    base_port: u16,
    collector_port: u16,
}

impl Addressing {
    pub fn new(host: IpAddr, base_port: u16, collector_port: u16) -> Self {
        Self {
            host,
            base_port,
            collector_port,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.host, config.base_port, config.collector_port)
    }

    /// Listening address of an agent; id 0 is the ground station
    pub fn agent(&self, id: AgentId) -> SwarmResult<SocketAddr> {
        let port = u16::try_from(id)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or(SwarmError::AddressError(id))?;
        Ok(SocketAddr::new(self.host, port))
    }

    pub fn ground_station(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.base_port)
    }

    pub fn collector(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.collector_port)
    }

    pub fn at_port(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.host, port)
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }
}

/// Bind a UDP socket, mapping failures to a fatal setup error
pub async fn bind(addr: SocketAddr) -> SwarmResult<UdpSocket> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| SwarmError::BindError { addr, source })
}

/// Bind a send-only socket on an ephemeral port of `host`
pub async fn bind_ephemeral(host: IpAddr) -> SwarmResult<UdpSocket> {
    bind(SocketAddr::new(host, 0)).await
}

/// Receive one datagram into `buf`
pub async fn recv_datagram(socket: &UdpSocket, buf: &mut [u8]) -> SwarmResult<(usize, SocketAddr)> {
    socket.recv_from(buf).await.map_err(SwarmError::ReceiveError)
}

/// Outbound half of a datagram socket
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> SwarmResult<()>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> SwarmResult<()> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            warn!(
                "Datagram of {} bytes to {} exceeds {} bytes and may be truncated",
                payload.len(),
                target,
                MAX_DATAGRAM_SIZE
            );
        }
        self.send_to(payload, target)
            .await
            .map(|_| ())
            .map_err(|source| SwarmError::SendError {
                addr: target,
                source,
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addressing() -> Addressing {
        Addressing::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 10000, 9999)
    }

    #[test]
    fn derives_agent_ports() {
        let addressing = addressing();
        assert_eq!(addressing.agent(0).unwrap().port(), 10000);
        assert_eq!(addressing.agent(7).unwrap().port(), 10007);
        assert_eq!(addressing.ground_station().port(), 10000);
        assert_eq!(addressing.collector().to_string(), "127.0.0.1:9999");
    }

    #[test]
    fn agent_port_overflow_is_an_error() {
        let addressing = addressing();
        assert!(matches!(
            addressing.agent(60000),
            Err(SwarmError::AddressError(60000))
        ));
        assert!(addressing.agent(u32::MAX).is_err());
    }

    #[tokio::test]
    async fn udp_sink_delivers_datagrams() {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let receiver = bind_ephemeral(host).await.unwrap();
        let sender = bind_ephemeral(host).await.unwrap();

        sender
            .send_datagram(b"(POS,1,2,3)", receiver.local_addr().unwrap())
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (n, from) = recv_datagram(&receiver, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"(POS,1,2,3)");
        assert_eq!(from, sender.local_addr().unwrap());
    }
}
