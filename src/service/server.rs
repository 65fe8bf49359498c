//! TCP server with graceful shutdown.
//!
//! Binds the configured address, spawns one session task per connection, and
//! runs the periodic relight task against every live session. Shutdown comes
//! from ctrl-c or [`Server::shutdown`]; sessions are told to disconnect and
//! the server drains them up to the configured timeout.

use crate::config::NetworkConfig;
use crate::error::{ProtocolError, Result};
use crate::game::block::{BlockPos, BlockState};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::interceptors::{
    relight_updates, BorderOverlay, ChunkTracker, ClientSettingsMonitor, DarkLightFollower,
    SkyLightEraser,
};
use crate::protocol::message::Packet;
use crate::protocol::pipeline::InterceptorPipeline;
use crate::session::connection::run_session;
use crate::session::registry::SessionRegistry;
use crate::utils::metrics::global_metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};

/// The interception server.
pub struct Server {
    config: Arc<NetworkConfig>,
    pipeline: Arc<InterceptorPipeline>,
    border: Option<Arc<BorderOverlay>>,
    dispatcher: Arc<Dispatcher>,
    registry: SessionRegistry,
    next_session_id: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    /// Build a server from a validated configuration.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate_strict()?;

        let (pipeline, border) = build_pipeline(&config);
        let pipeline = Arc::new(pipeline);
        let dispatcher = Arc::new(build_dispatcher()?);
        let registry = SessionRegistry::new(config.server.max_sessions);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            pipeline,
            border,
            dispatcher,
            registry,
            next_session_id: AtomicU64::new(1),
            shutdown_tx,
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<InterceptorPipeline> {
        &self.pipeline
    }

    /// Show the configured border ring to one session, anchored at `center`.
    ///
    /// # Errors
    /// Fails when the border handler is disabled in the configuration or the
    /// session is gone.
    pub fn enable_border(&self, session_id: u64, center: BlockPos) -> Result<()> {
        let border = self.border.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("Border overlay is disabled".to_string())
        })?;
        let session = self
            .registry
            .get(session_id)
            .ok_or(ProtocolError::ConnectionClosed)?;
        session.enable_border(border, center)
    }

    /// Take the border ring away from one session, restoring what it saw.
    pub fn disable_border(&self, session_id: u64) -> Result<()> {
        let border = self.border.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("Border overlay is disabled".to_string())
        })?;
        let session = self
            .registry
            .get(session_id)
            .ok_or(ProtocolError::ConnectionClosed)?;
        session.disable_border(border)
    }

    /// Signal the accept loop and every session to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the accept loop until shutdown, then drain sessions.
    #[instrument(skip(self), fields(address = %self.config.server.address))]
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.address).await?;
        info!(address = %self.config.server.address, "Listening");

        // ctrl-c feeds the same shutdown channel as Server::shutdown.
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(true);
            }
        });

        let relight = tokio::spawn(relight_task(
            self.registry.clone(),
            self.config.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Shutting down server. Waiting for sessions to close...");
                    self.drain_sessions().await;
                    let _ = relight.await;
                    global_metrics().log_metrics();
                    return Ok(());
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                            debug!(session_id, peer = %addr, "connection accepted");
                            let config = self.config.clone();
                            let pipeline = self.pipeline.clone();
                            let dispatcher = self.dispatcher.clone();
                            let registry = self.registry.clone();
                            let shutdown = self.shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                let _ = run_session(
                                    stream,
                                    addr.to_string(),
                                    session_id,
                                    config,
                                    pipeline,
                                    dispatcher,
                                    registry,
                                    shutdown,
                                )
                                .await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }

    async fn drain_sessions(&self) {
        let timeout = tokio::time::sleep(self.config.server.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    warn!(remaining = self.registry.len(), "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    let remaining = self.registry.len();
                    if remaining == 0 {
                        info!("All sessions closed, shutting down");
                        return;
                    }
                    debug!(sessions = remaining, "Waiting for sessions to close");
                }
            }
        }
    }
}

/// Register the built-in handlers the configuration asks for. The border
/// handler is handed back too, so [`Server::enable_border`] can drive the
/// same instance the pipeline runs.
fn build_pipeline(config: &NetworkConfig) -> (InterceptorPipeline, Option<Arc<BorderOverlay>>) {
    let mut pipeline = InterceptorPipeline::new();
    pipeline.register(Arc::new(ClientSettingsMonitor::new(
        config.protocol.max_view_distance,
    )));
    pipeline.register(Arc::new(ChunkTracker));
    if config.interception.erase_sky_light {
        pipeline.register(Arc::new(SkyLightEraser));
    }
    if config.interception.dark_light_follow {
        pipeline.register(Arc::new(DarkLightFollower::new(
            config.interception.min_section,
        )));
    }
    let mut border = None;
    if config.interception.border.enabled {
        let settings = &config.interception.border;
        let handler = Arc::new(BorderOverlay::new(
            settings.radius,
            BlockState(settings.block_state),
            settings.y_min,
            settings.y_max,
        ));
        pipeline.register(handler.clone());
        border = Some(handler);
    }
    (pipeline, border)
}

/// Protocol-driven replies: login acceptance and the packets that only need
/// to be acknowledged by being consumed.
fn build_dispatcher() -> Result<Dispatcher> {
    let dispatcher = Dispatcher::new();

    dispatcher.register("LOGIN_START", |packet| match packet {
        Packet::LoginStart { name } => Ok(Some(Packet::LoginSuccess {
            id: rand::random::<u128>(),
            name: name.clone(),
        })),
        _ => Ok(None),
    })?;

    for opcode in [
        "CLIENT_SETTINGS",
        "ACK_FINISH_CONFIGURATION",
        "KEEP_ALIVE",
        "PLAYER_POSITION",
    ] {
        dispatcher.register(opcode, |_| Ok(None))?;
    }

    Ok(dispatcher)
}

/// Periodically re-darken every chunk each session has loaded, so any light
/// the server recomputed since the last pass goes black again.
async fn relight_task(
    registry: SessionRegistry,
    config: Arc<NetworkConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    if !config.interception.erase_sky_light && !config.interception.dark_light_follow {
        return;
    }
    let interval = tokio::time::interval(config.server.relight_interval);
    let mut ticks = IntervalStream::new(interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            tick = ticks.next() => {
                if tick.is_none() {
                    return;
                }
                for session in registry.sessions() {
                    let chunks = match session.with_view(|view| view.loaded_chunks.clone()) {
                        Ok(chunks) => chunks,
                        Err(e) => {
                            warn!(session_id = session.id(), error = %e, "relight skipped");
                            continue;
                        }
                    };
                    if chunks.is_empty() {
                        continue;
                    }
                    let updates = relight_updates(
                        &chunks,
                        config.interception.min_section,
                        config.interception.section_count,
                    );
                    debug!(
                        session_id = session.id(),
                        chunks = chunks.len(),
                        "relight pass"
                    );
                    for update in updates {
                        if session.send_silent(&update).is_err() {
                            // Queue full or session gone; the next pass retries.
                            break;
                        }
                    }
                }
            }
        }
    }
}
