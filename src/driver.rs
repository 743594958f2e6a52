//! Background task pulling frames from a [`Provider`].
//!
//! [`Driver::spawn`] moves the provider into a tokio task that publishes every
//! frame on a `watch` channel. Consumers always see the latest frame; a slow
//! consumer skips frames rather than slowing the provider down. Session text is
//! fetched whenever a frame's `session_version` changes and published on a second
//! `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::provider::Provider;
use crate::session::SessionDocument;
use crate::types::FramePacket;

/// Consecutive provider errors after which the driver gives up.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Session text in effect from some frame on.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub version: i32,
    pub text: String,
    /// Parsed subset, absent when the text did not parse
    pub document: Option<SessionDocument>,
}

pub type FrameReceiver = watch::Receiver<Option<Arc<FramePacket>>>;
pub type SessionReceiver = watch::Receiver<Option<Arc<SessionSnapshot>>>;

/// Handle to a running driver task.
#[derive(Debug)]
pub struct DriverHandle {
    pub frames: FrameReceiver,
    pub sessions: SessionReceiver,
    cancel: CancellationToken,
    paused: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop pulling frames until [`DriverHandle::resume`].
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the task and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for the task to finish on its own.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Driver task failed");
        }
    }
}

/// Spawns frame reader tasks.
pub struct Driver;

impl Driver {
    /// Start pulling frames from `provider` on the current tokio runtime.
    pub fn spawn<P: Provider>(provider: P) -> DriverHandle {
        let (frame_tx, frames) = watch::channel(None);
        let (session_tx, sessions) = watch::channel(None);
        let (paused, paused_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::frame_reader(provider, frame_tx, session_tx, paused_rx, cancel.clone()));

        DriverHandle { frames, sessions, cancel, paused, task }
    }

    async fn frame_reader<P: Provider>(
        mut provider: P,
        frame_tx: watch::Sender<Option<Arc<FramePacket>>>,
        session_tx: watch::Sender<Option<Arc<SessionSnapshot>>>,
        mut paused: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) {
        info!(tick_rate = provider.tick_rate(), "Frame reader started");
        let mut frames = 0u64;
        let mut errors = 0u32;
        let mut session_version = None;

        loop {
            if *paused.borrow_and_update() {
                debug!("Frame reader paused");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = paused.wait_for(|paused| !paused) => {
                        if changed.is_err() {
                            break;
                        }
                        debug!("Frame reader resumed");
                    }
                }
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Frame reader cancelled");
                    break;
                }
                result = provider.next_frame() => result,
            };

            match result {
                Ok(Some(packet)) => {
                    frames += 1;
                    errors = 0;
                    trace!(frames, tick = packet.tick, version = packet.session_version, "Frame");

                    if session_version != Some(packet.session_version) {
                        session_version = Some(packet.session_version);
                        Self::publish_session(&mut provider, packet.session_version, &session_tx).await;
                    }

                    if frame_tx.send(Some(Arc::new(packet))).is_err() {
                        debug!("All frame receivers dropped; stopping");
                        break;
                    }
                }
                Ok(None) => {
                    info!(frames, "Provider ended");
                    break;
                }
                Err(e) => {
                    errors += 1;
                    error!(error = %e, errors, max = MAX_CONSECUTIVE_ERRORS, "Provider error");
                    if errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many provider errors; stopping");
                        break;
                    }
                    // 100ms, 200ms, 400ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 << errors.min(5));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        frame_tx.send_replace(None);
        session_tx.send_replace(None);
        info!(frames, "Frame reader stopped");
    }

    async fn publish_session<P: Provider>(
        provider: &mut P,
        version: i32,
        session_tx: &watch::Sender<Option<Arc<SessionSnapshot>>>,
    ) {
        match provider.session_info(version).await {
            Ok(Some(text)) => {
                let document = match SessionDocument::parse(&text) {
                    Ok(document) => Some(document),
                    Err(e) => {
                        warn!(version, error = %e, "Session text did not parse");
                        None
                    }
                };
                debug!(version, bytes = text.len(), "Session updated");
                session_tx.send_replace(Some(Arc::new(SessionSnapshot { version, text, document })));
            }
            Ok(None) => debug!(version, "No session text"),
            Err(e) => warn!(version, error = %e, "Failed to read session text"),
        }
    }
}
