//! Session coordinator: owns the transport and both pipeline lifecycles.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::audio::playback::{CpalPlayer, CpalSink, PlaybackQueue};
use crate::audio::{CaptureHandler, SAMPLE_RATE};
use crate::config::Config;
use crate::network::Transport;
use crate::state::AppState;

struct ActiveSession {
    capture: CaptureHandler,
    player: CpalPlayer,
    playback: PlaybackQueue<CpalSink>,
    transport: Transport,
    state: Arc<AppState>,
}

/// On/off lifecycle for the whole client. Inactive until `start` succeeds;
/// a failed start tears down whatever came up and leaves the session
/// inactive, so the operator-visible toggle never half-activates.
pub struct Session {
    config: Config,
    active: Option<ActiveSession>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Bring up playback, transport and capture, in that order. The capture
    /// device is acquired last: if the microphone is unavailable, the
    /// already-opened transport and output stream are torn down again and
    /// the session stays in its pre-start state.
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }

        let state = Arc::new(AppState::new());

        let player = CpalPlayer::new(SAMPLE_RATE)?;
        let playback = PlaybackQueue::new(player.sink(), SAMPLE_RATE);

        let (blocks_tx, blocks_rx) = mpsc::unbounded_channel();

        let transport = Transport::connect(
            &self.config.endpoint,
            state.clone(),
            blocks_rx,
            playback.clone(),
        )
        .await?;

        let capture = match CaptureHandler::start(&self.config, blocks_tx) {
            Ok(capture) => capture,
            Err(e) => {
                transport.close().await;
                playback.clear();
                return Err(e).context("Failed to acquire capture device");
            }
        };

        self.active = Some(ActiveSession {
            capture,
            player,
            playback,
            transport,
            state,
        });

        info!("Session started");
        Ok(())
    }

    /// Tear down in order: halt the capture source, release the audio
    /// streams, close the transport. Every step is best-effort and a
    /// second stop is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(session) = self.active.take() else {
            return Ok(());
        };

        session.capture.halt();
        // Dropping the capture handler releases the input stream and closes
        // the block channel, which lets the sender task finish.
        drop(session.capture);

        session.playback.clear();
        drop(session.player);

        session.transport.close().await;

        info!("Session stopped ({})", session.state.summary());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_without_start_is_ok() {
        let mut session = Session::new(Config::default());
        assert!(!session.is_active());
        assert!(session.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_twice_is_ok() {
        let mut session = Session::new(Config::default());
        assert!(session.stop().await.is_ok());
        assert!(session.stop().await.is_ok());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_start_fails_cleanly_without_service() {
        // Nothing listens on this endpoint; start must fail and leave the
        // session inactive.
        let mut session = Session::new(Config {
            endpoint: "ws://127.0.0.1:1/ws".to_string(),
            ..Config::default()
        });

        // Skip on machines without audio devices: transport comes after the
        // output stream, so a device error is also a clean failure.
        let result = session.start().await;
        assert!(result.is_err());
        assert!(!session.is_active());
        assert!(session.stop().await.is_ok());
    }
}
