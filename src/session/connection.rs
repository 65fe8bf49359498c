//! Per-connection protocol loop.
//!
//! One task per socket: frames the stream, walks the phase state machine,
//! runs every serverbound packet through the pipeline, and answers
//! protocol-driven exchanges through the dispatcher. Outbound frames go
//! through a dedicated writer task fed by the session's queue, so slow
//! clients never block the read path.

use crate::config::NetworkConfig;
use crate::core::codec::{CompressionSettings, FrameCodec};
use crate::core::packet::RawPacket;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{Packet, PROTOCOL_VERSION};
use crate::protocol::phase::{Direction, Phase};
use crate::protocol::pipeline::{InterceptorPipeline, SessionView};
use crate::session::registry::{Session, SessionRegistry};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, trace, warn};

/// Drive one connection until the peer disconnects, the server shuts down,
/// or a protocol violation kills the session.
#[instrument(skip_all, fields(session_id, peer = %peer))]
pub async fn run_session<S>(
    stream: S,
    peer: String,
    session_id: u64,
    config: Arc<NetworkConfig>,
    pipeline: Arc<InterceptorPipeline>,
    dispatcher: Arc<Dispatcher>,
    registry: SessionRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut codec = FrameCodec::new(config.protocol.max_frame_len);
    if config.protocol.compression_enabled {
        codec.enable_compression(CompressionSettings {
            kind: config.protocol.compression_kind,
            threshold: config.protocol.compression_threshold_bytes,
        });
    }
    let framed = Framed::new(stream, codec);
    let (sink, mut frames) = framed.split();

    let (outbound_tx, outbound_rx) = mpsc::channel::<Bytes>(config.server.backpressure_limit);
    let writer = tokio::spawn(write_outbound(sink, outbound_rx));

    let view = SessionView::new(session_id, config.protocol.max_view_distance);
    let session = Session::new(session_id, peer.clone(), view, outbound_tx, pipeline);

    if let Err(e) = registry.register(session.clone()) {
        warn!(session_id, peer = %peer, "session rejected at capacity");
        let _ = session.send_silent(&Packet::Disconnect {
            reason: "Server is full".to_string(),
        });
        drop(session);
        let _ = writer.await;
        return Err(e);
    }
    info!(session_id, peer = %peer, "session opened");

    let result = session_loop(&mut frames, &session, &config, &dispatcher, &mut shutdown).await;

    if let Err(e) = &result {
        global_metrics().protocol_error();
        warn!(session_id, peer = %peer, error = %e, "session terminated with error");
        let _ = session.send_silent(&Packet::Disconnect {
            reason: format!("Protocol error: {e}"),
        });
    } else {
        info!(session_id, peer = %peer, "session closed");
    }

    registry.remove(session_id);
    drop(session);
    // All senders are gone now; the writer drains the queue and exits.
    let _ = writer.await;
    result
}

async fn session_loop<S>(
    frames: &mut SplitStream<Framed<S, FrameCodec>>,
    session: &Session,
    config: &NetworkConfig,
    dispatcher: &Dispatcher,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut phase = Phase::Handshake;
    // `interval` would complete its first tick immediately; schedule the first
    // probe one full period out so fresh sessions get no unscheduled keep-alive.
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + config.server.keepalive_interval,
        config.server.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The read deadline is anchored to the last frame that arrived, never to
    // loop iterations, so keep-alive ticks cannot keep a silent client alive.
    let mut last_read = Instant::now();

    loop {
        // Pre-play phases get the shorter handshake deadline.
        let read_timeout = if phase == Phase::Play {
            config.server.idle_timeout
        } else {
            config.server.connection_timeout
        };

        tokio::select! {
            _ = shutdown.changed() => {
                let _ = session.send_silent(&Packet::Disconnect {
                    reason: "Server shutting down".to_string(),
                });
                return Ok(());
            }
            _ = keepalive.tick() => {
                if phase == Phase::Play {
                    session.send_silent(&Packet::KeepAlive {
                        id: crate::utils::time::unix_millis() as i64,
                    })?;
                }
            }
            _ = sleep_until(last_read + read_timeout) => {
                return Err(ProtocolError::ConnectionTimeout);
            }
            frame = frames.next() => {
                let frame = match frame {
                    None => return Ok(()),
                    Some(result) => result?,
                };
                last_read = Instant::now();
                global_metrics().packet_received(frame.len() as u64);

                let raw = RawPacket::from_frame(frame)?;
                let packet = Packet::decode(phase, Direction::Serverbound, &raw)?;
                trace!(kind = packet.kind(), phase = %phase, "packet received");

                let outcome = session.process_serverbound(packet)?;
                session.deliver_injections(outcome.injections)?;
                let Some(packet) = outcome.packet else {
                    continue;
                };
                phase = advance(phase, packet, session, dispatcher)?;
            }
        }
    }
}

/// Apply one forwarded serverbound packet to the phase machine, sending any
/// protocol-driven replies along the way.
fn advance(
    phase: Phase,
    packet: Packet,
    session: &Session,
    dispatcher: &Dispatcher,
) -> Result<Phase> {
    if let (Packet::Hello { protocol_version }, Phase::Handshake) = (&packet, phase) {
        if *protocol_version != PROTOCOL_VERSION {
            let _ = session.send_silent(&Packet::Disconnect {
                reason: format!("Unsupported protocol version {protocol_version}"),
            });
            return Err(ProtocolError::UnsupportedVersion(*protocol_version));
        }
        return Ok(Phase::Login);
    }

    let mut next = phase;

    if dispatcher.handles(packet.kind()) {
        if let Some(reply) = dispatcher.dispatch(&packet)? {
            let login_accepted = matches!(reply, Packet::LoginSuccess { .. });
            session.send(reply)?;
            if login_accepted && phase == Phase::Login {
                session.send(Packet::FinishConfiguration)?;
                next = Phase::Configuration;
            }
        }
    } else {
        trace!(kind = packet.kind(), "no dispatcher handler, packet dropped");
    }

    if matches!(packet, Packet::AckFinishConfiguration) && phase == Phase::Configuration {
        debug!(session_id = session.id(), "configuration acknowledged");
        next = Phase::Play;
    }

    Ok(next)
}

async fn write_outbound<S>(
    mut sink: SplitSink<Framed<S, FrameCodec>, Bytes>,
    mut outbound: mpsc::Receiver<Bytes>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        global_metrics().packet_sent(frame.len() as u64);
        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "outbound write failed");
            break;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::pipeline::InterceptorPipeline;

    fn test_session(capacity: usize) -> (Session, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = Session::new(
            1,
            "test".to_string(),
            SessionView::new(1, 8),
            tx,
            Arc::new(InterceptorPipeline::new()),
        );
        (session, rx)
    }

    fn login_dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register("LOGIN_START", |packet| match packet {
                Packet::LoginStart { name } => Ok(Some(Packet::LoginSuccess {
                    id: 7,
                    name: name.clone(),
                })),
                _ => Ok(None),
            })
            .expect("register");
        dispatcher
    }

    #[test]
    fn test_hello_advances_to_login() {
        let (session, _rx) = test_session(4);
        let next = advance(
            Phase::Handshake,
            Packet::Hello {
                protocol_version: PROTOCOL_VERSION,
            },
            &session,
            &Dispatcher::new(),
        )
        .expect("advance");
        assert_eq!(next, Phase::Login);
    }

    #[test]
    fn test_version_mismatch_disconnects() {
        let (session, mut rx) = test_session(4);
        let err = advance(
            Phase::Handshake,
            Packet::Hello {
                protocol_version: PROTOCOL_VERSION + 1,
            },
            &session,
            &Dispatcher::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion(_)));
        // A disconnect frame must have been queued.
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_login_reply_enters_configuration() {
        let (session, mut rx) = test_session(8);
        let next = advance(
            Phase::Login,
            Packet::LoginStart {
                name: "alex".to_string(),
            },
            &session,
            &login_dispatcher(),
        )
        .expect("advance");
        assert_eq!(next, Phase::Configuration);
        // LoginSuccess then FinishConfiguration.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ack_enters_play() {
        let (session, _rx) = test_session(4);
        let next = advance(
            Phase::Configuration,
            Packet::AckFinishConfiguration,
            &session,
            &Dispatcher::new(),
        )
        .expect("advance");
        assert_eq!(next, Phase::Play);
    }
}
