//! Integration tests for the WebSocket rendezvous relay.
//!
//! These spin up a real relay on a loopback port and drive real
//! WebSocket connections through it, verifying that the BIND/DIAL/
//! ACCEPT handshake pairs peers and that data flows both ways.

#![cfg(feature = "relay")]

use squall_link::{Link, LinkError, Listener, Network, RelayNetwork, RelayServer, SessionCode};

async fn start_relay() -> RelayNetwork {
    let relay = RelayServer::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = relay.local_addr().expect("local addr");
    tokio::spawn(relay.run());
    RelayNetwork::new(format!("ws://{addr}"))
}

#[tokio::test]
async fn test_relay_pairs_host_and_client() {
    let net = start_relay().await;
    let code = SessionCode::new("RELAY1");

    let mut listener = net.listen(&code).await.expect("listen");

    let (client, server) = tokio::join!(net.connect(&code), listener.accept());
    let client = client.expect("connect");
    let server = server.expect("accept");

    client.send(b"ping").await.expect("send");
    assert_eq!(server.recv().await.unwrap(), Some(b"ping".to_vec()));

    server.send(b"pong").await.expect("send back");
    assert_eq!(client.recv().await.unwrap(), Some(b"pong".to_vec()));
}

#[tokio::test]
async fn test_relay_preserves_message_order() {
    let net = start_relay().await;
    let code = SessionCode::new("RELAY2");

    let mut listener = net.listen(&code).await.expect("listen");
    let (client, server) = tokio::join!(net.connect(&code), listener.accept());
    let client = client.expect("connect");
    let server = server.expect("accept");

    for i in 0u8..20 {
        client.send(&[i]).await.expect("send");
    }
    for i in 0u8..20 {
        assert_eq!(server.recv().await.unwrap(), Some(vec![i]));
    }
}

#[tokio::test]
async fn test_relay_supports_multiple_clients_per_code() {
    let net = start_relay().await;
    let code = SessionCode::new("RELAY3");

    let mut listener = net.listen(&code).await.expect("listen");

    let (c1, s1) = tokio::join!(net.connect(&code), listener.accept());
    let (c2, s2) = tokio::join!(net.connect(&code), listener.accept());
    let (c1, s1) = (c1.unwrap(), s1.unwrap());
    let (c2, s2) = (c2.unwrap(), s2.unwrap());

    c1.send(b"one").await.unwrap();
    c2.send(b"two").await.unwrap();

    assert_eq!(s1.recv().await.unwrap(), Some(b"one".to_vec()));
    assert_eq!(s2.recv().await.unwrap(), Some(b"two".to_vec()));
}

#[tokio::test]
async fn test_relay_rejects_duplicate_bind() {
    let net = start_relay().await;
    let code = SessionCode::new("RELAY4");

    let _listener = net.listen(&code).await.expect("first bind");
    let second = net.listen(&code).await;

    assert!(matches!(second, Err(LinkError::UnavailableCode(_))));
}

#[tokio::test]
async fn test_relay_rejects_unknown_code() {
    let net = start_relay().await;

    let result = net.connect(&SessionCode::new("NOBODY")).await;

    assert!(matches!(result, Err(LinkError::UnknownCode(_))));
}

#[tokio::test]
async fn test_code_is_rebindable_after_listener_dropped() {
    let net = start_relay().await;
    let code = SessionCode::new("RELAY5");

    let listener = net.listen(&code).await.expect("first bind");
    drop(listener);

    // The relay releases the code when the control connection drops;
    // poll briefly until it does.
    let mut rebound = None;
    for _ in 0..50 {
        match net.listen(&code).await {
            Ok(l) => {
                rebound = Some(l);
                break;
            }
            Err(LinkError::UnavailableCode(_)) => {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(rebound.is_some(), "code was never released");
}

#[tokio::test]
async fn test_peer_close_is_observed() {
    let net = start_relay().await;
    let code = SessionCode::new("RELAY6");

    let mut listener = net.listen(&code).await.expect("listen");
    let (client, server) = tokio::join!(net.connect(&code), listener.accept());
    let client = client.unwrap();
    let server = server.unwrap();

    client.close().await;

    assert_eq!(server.recv().await.unwrap(), None);
}
