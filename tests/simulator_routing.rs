use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use dronenet::core::config::Config;
use dronenet::protocol::{Content, Message, MAX_DATAGRAM_SIZE};
use dronenet::simulator::SimulatorService;

async fn recv_message(socket: &UdpSocket) -> Message {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let (n, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("No route received in time")
        .expect("Receive failed");
    Message::decode(&buf[..n]).expect("Route is not a valid message")
}

#[tokio::test]
async fn simulator_routes_drones_through_relays() {
    // drone sockets at base_port + 1 and base_port + 2
    let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let base_port = first.local_addr().unwrap().port() - 1;
    let second = match UdpSocket::bind(("127.0.0.1", base_port + 2)).await {
        Ok(socket) => socket,
        Err(_) => return,
    };

    let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let listen_port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = Config::for_testing(base_port, listen_port);
    let service = SimulatorService::bind(&config).await.unwrap();
    let task = tokio::spawn(service.clone().run());

    let reporter = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let simulator_addr = ("127.0.0.1", listen_port);
    reporter.send_to(b"(POS,1,8,0)", simulator_addr).await.unwrap();
    reporter.send_to(b"2,16.0,0.0", simulator_addr).await.unwrap();

    let route = recv_message(&first).await;
    assert_eq!(route.content, Content::Path);
    assert_eq!(route.sender, 0);
    assert_eq!(route.path, vec![0]);

    let route = recv_message(&second).await;
    assert_eq!(route.content, Content::Path);
    assert_eq!(route.path, vec![0, 1]);

    task.abort();
}
