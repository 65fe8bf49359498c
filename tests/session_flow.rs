#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end session tests over an in-memory duplex stream: the full
//! handshake, traffic rewriting on the live wire, and shutdown behavior.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use packetbag::config::NetworkConfig;
use packetbag::core::codec::FrameCodec;
use packetbag::core::packet::RawPacket;
use packetbag::error::ProtocolError;
use packetbag::game::block::{BlockPos, BlockState};
use packetbag::game::chunk::ChunkPos;
use packetbag::game::light::LightData;
use packetbag::protocol::dispatcher::Dispatcher;
use packetbag::protocol::interceptors::{DarkLightFollower, SkyLightEraser};
use packetbag::protocol::message::{Packet, PROTOCOL_VERSION};
use packetbag::protocol::phase::{Direction, Phase};
use packetbag::protocol::pipeline::InterceptorPipeline;
use packetbag::session::{run_session, SessionRegistry};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;

type ClientFramed = Framed<DuplexStream, FrameCodec>;

fn test_config() -> NetworkConfig {
    NetworkConfig::default_with_overrides(|c| {
        c.server.max_sessions = 4;
        c.server.connection_timeout = Duration::from_secs(2);
        c.server.idle_timeout = Duration::from_secs(5);
        // Keep the ticker out of the way so reads are deterministic.
        c.server.keepalive_interval = Duration::from_secs(3600);
    })
}

fn test_pipeline() -> Arc<InterceptorPipeline> {
    let mut pipeline = InterceptorPipeline::new();
    pipeline.register(Arc::new(SkyLightEraser));
    pipeline.register(Arc::new(DarkLightFollower::new(-4)));
    Arc::new(pipeline)
}

fn test_dispatcher() -> Arc<Dispatcher> {
    let dispatcher = Dispatcher::new();
    dispatcher
        .register("LOGIN_START", |packet| match packet {
            Packet::LoginStart { name } => Ok(Some(Packet::LoginSuccess {
                id: 0x1234,
                name: name.clone(),
            })),
            _ => Ok(None),
        })
        .expect("register");
    for opcode in ["CLIENT_SETTINGS", "ACK_FINISH_CONFIGURATION", "KEEP_ALIVE"] {
        dispatcher.register(opcode, |_| Ok(None)).expect("register");
    }
    Arc::new(dispatcher)
}

struct Harness {
    client: ClientFramed,
    registry: SessionRegistry,
    shutdown: watch::Sender<bool>,
    server_task: tokio::task::JoinHandle<packetbag::Result<()>>,
}

fn spawn_session(session_id: u64, registry: &SessionRegistry) -> Harness {
    spawn_session_with(session_id, registry, test_config())
}

fn spawn_session_with(
    session_id: u64,
    registry: &SessionRegistry,
    config: NetworkConfig,
) -> Harness {
    let config = Arc::new(config);
    let (client_end, server_end) = tokio::io::duplex(256 * 1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_task = tokio::spawn(run_session(
        server_end,
        format!("test-peer-{session_id}"),
        session_id,
        config.clone(),
        test_pipeline(),
        test_dispatcher(),
        registry.clone(),
        shutdown_rx,
    ));

    Harness {
        client: Framed::new(client_end, FrameCodec::default()),
        registry: registry.clone(),
        shutdown: shutdown_tx,
        server_task,
    }
}

async fn client_send(client: &mut ClientFramed, packet: &Packet) {
    client
        .send(packet.encode().to_frame())
        .await
        .expect("client send");
}

async fn client_recv(client: &mut ClientFramed, phase: Phase) -> Packet {
    let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("receive deadline")
        .expect("stream open")
        .expect("frame decode");
    let raw = RawPacket::from_frame(frame).expect("raw packet");
    Packet::decode(phase, Direction::Clientbound, &raw).expect("typed packet")
}

async fn login(client: &mut ClientFramed) {
    client_send(
        client,
        &Packet::Hello {
            protocol_version: PROTOCOL_VERSION,
        },
    )
    .await;
    client_send(
        client,
        &Packet::LoginStart {
            name: "tester".to_string(),
        },
    )
    .await;

    match client_recv(client, Phase::Login).await {
        Packet::LoginSuccess { name, .. } => assert_eq!(name, "tester"),
        other => panic!("expected login success, got {other:?}"),
    }
    match client_recv(client, Phase::Configuration).await {
        Packet::FinishConfiguration => {}
        other => panic!("expected finish configuration, got {other:?}"),
    }
    client_send(client, &Packet::AckFinishConfiguration).await;
}

// ============================================================================
// HANDSHAKE AND LOGIN
// ============================================================================

#[tokio::test]
async fn test_full_login_flow() {
    let registry = SessionRegistry::new(4);
    let mut h = spawn_session(1, &registry);

    login(&mut h.client).await;

    // The session is registered and idle in play phase now.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.registry.len(), 1);

    let _ = h.shutdown.send(true);
    match client_recv(&mut h.client, Phase::Play).await {
        Packet::Disconnect { reason } => assert!(reason.contains("shutting down")),
        other => panic!("expected disconnect, got {other:?}"),
    }
    h.server_task.await.expect("join").expect("clean close");
    assert_eq!(h.registry.len(), 0);
}

#[tokio::test]
async fn test_wrong_protocol_version_rejected() {
    let registry = SessionRegistry::new(4);
    let mut h = spawn_session(1, &registry);

    client_send(
        &mut h.client,
        &Packet::Hello {
            protocol_version: PROTOCOL_VERSION + 10,
        },
    )
    .await;

    match client_recv(&mut h.client, Phase::Handshake).await {
        Packet::Disconnect { reason } => assert!(reason.contains("Unsupported")),
        other => panic!("expected disconnect, got {other:?}"),
    }
    let result = h.server_task.await.expect("join");
    assert!(matches!(result, Err(ProtocolError::UnsupportedVersion(_))));
}

#[tokio::test]
async fn test_garbage_input_terminates_session() {
    let registry = SessionRegistry::new(4);
    let mut h = spawn_session(1, &registry);

    // A valid frame whose body is not a known handshake packet.
    h.client
        .send(Bytes::from_static(&[0x7F, 0xAA, 0xBB]))
        .await
        .expect("send");

    let result = h.server_task.await.expect("join");
    assert!(matches!(
        result,
        Err(ProtocolError::UnknownPacket { .. })
    ));
    assert_eq!(h.registry.len(), 0);
}

#[tokio::test]
async fn test_session_limit_rejects_with_disconnect() {
    let registry = SessionRegistry::new(1);
    let mut first = spawn_session(1, &registry);
    login(&mut first.client).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second = spawn_session(2, &registry);
    match client_recv(&mut second.client, Phase::Handshake).await {
        Packet::Disconnect { reason } => assert!(reason.contains("full")),
        other => panic!("expected disconnect, got {other:?}"),
    }
    let result = second.server_task.await.expect("join");
    assert!(matches!(result, Err(ProtocolError::SessionLimit)));

    let _ = first.shutdown.send(true);
    let _ = first.server_task.await;
}

// ============================================================================
// LIVE TRAFFIC REWRITING
// ============================================================================

#[tokio::test]
async fn test_clientbound_chunk_is_darkened_on_the_wire() {
    let registry = SessionRegistry::new(4);
    let mut h = spawn_session(1, &registry);
    login(&mut h.client).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let session = h.registry.get(1).expect("registered session");
    let sections: BTreeSet<i32> = [0].into_iter().collect();
    let mut light = LightData::dark(&sections, -4, true, false);
    for section in &mut light.sky_sections {
        section.fill(0xFF);
    }
    session
        .send(Packet::ChunkData {
            chunk: ChunkPos::new(3, 3),
            sections: Bytes::from_static(&[1, 2, 3]),
            light,
        })
        .expect("send through pipeline");

    match client_recv(&mut h.client, Phase::Play).await {
        Packet::ChunkData { chunk, light, .. } => {
            assert_eq!(chunk, ChunkPos::new(3, 3));
            assert!(light.sky_sections.iter().all(|s| s.iter().all(|&b| b == 0)));
        }
        other => panic!("expected chunk data, got {other:?}"),
    }

    // Release the registry handle so the writer task can drain and exit.
    drop(session);
    let _ = h.shutdown.send(true);
    let _ = h.server_task.await;
}

#[tokio::test]
async fn test_block_change_reaches_client_with_darkness_follow_up() {
    let registry = SessionRegistry::new(4);
    let mut h = spawn_session(1, &registry);
    login(&mut h.client).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let session = h.registry.get(1).expect("registered session");
    session
        .send(Packet::BlockChange {
            pos: BlockPos::new(50, 70, 50),
            state: BlockState(77),
        })
        .expect("send through pipeline");

    match client_recv(&mut h.client, Phase::Play).await {
        Packet::BlockChange { pos, state } => {
            assert_eq!(pos, BlockPos::new(50, 70, 50));
            assert_eq!(state, BlockState(77));
        }
        other => panic!("expected block change, got {other:?}"),
    }
    match client_recv(&mut h.client, Phase::Play).await {
        Packet::UpdateLight { chunk, light } => {
            assert_eq!(chunk, ChunkPos::new(3, 3));
            assert!(light.is_consistent());
        }
        other => panic!("expected light update, got {other:?}"),
    }

    // Release the registry handle so the writer task can drain and exit.
    drop(session);
    let _ = h.shutdown.send(true);
    let _ = h.server_task.await;
}

#[tokio::test]
async fn test_idle_play_session_times_out_between_keepalives() {
    let registry = SessionRegistry::new(4);
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.max_sessions = 4;
        c.server.connection_timeout = Duration::from_secs(2);
        c.server.idle_timeout = Duration::from_millis(300);
        c.server.keepalive_interval = Duration::from_millis(100);
    });
    let mut h = spawn_session_with(1, &registry, config);
    login(&mut h.client).await;

    // Go silent. Keep-alive probes outpace the idle window, but a client
    // that never writes must still be dropped once the window lapses.
    let result = tokio::time::timeout(Duration::from_secs(3), h.server_task)
        .await
        .expect("idle session never timed out")
        .expect("join");
    assert!(matches!(result, Err(ProtocolError::ConnectionTimeout)));
    assert_eq!(h.registry.len(), 0);
}

#[tokio::test]
async fn test_keepalive_echo_is_consumed() {
    let registry = SessionRegistry::new(4);
    let mut h = spawn_session(1, &registry);
    login(&mut h.client).await;

    // The echo produces no reply and must not kill the session.
    client_send(&mut h.client, &Packet::KeepAlive { id: 99 }).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.registry.len(), 1);

    let _ = h.shutdown.send(true);
    let _ = h.server_task.await;
}
