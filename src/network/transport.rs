//! WebSocket transport: gated outbound PCM, inbound PCM into the playback
//! queue.
//!
//! Messages are raw little-endian 16-bit PCM with no framing; one WebSocket
//! binary message per block in both directions. Sends are fire-and-forget:
//! there is no acknowledgement, retry or backoff, and blocks that cannot be
//! sent are dropped and counted rather than buffered.

use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::net::TcpStream;
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::audio::decode_pcm16;
use crate::audio::encoder::EncodedBlock;
use crate::audio::playback::{BlockSink, PlaybackQueue};
use crate::state::AppState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open connection to the assistant service.
///
/// Owns two tasks: the sender (transmission gate) forwarding non-gated
/// capture blocks, and the receiver feeding decoded blocks into the playback
/// queue. Both end on their own when the connection or the capture channel
/// closes.
pub struct Transport {
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    sender_task: JoinHandle<()>,
    receiver_task: JoinHandle<()>,
}

impl Transport {
    pub async fn connect<S: BlockSink>(
        endpoint: &str,
        state: Arc<AppState>,
        blocks: UnboundedReceiver<EncodedBlock>,
        playback: PlaybackQueue<S>,
    ) -> Result<Self> {
        let url = Url::parse(endpoint).context("Invalid endpoint URL")?;

        let (ws, _response) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", endpoint))?;

        info!("Connected to {}", endpoint);
        state.transport_open.store(true, Ordering::Release);

        let (ws_sink, ws_stream) = ws.split();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let sender_task = tokio::spawn(Self::sender_loop(
            ws_sink,
            blocks,
            shutdown_rx,
            state.clone(),
        ));
        let receiver_task = tokio::spawn(Self::receiver_loop(ws_stream, playback, state.clone()));

        Ok(Self {
            state,
            shutdown: Some(shutdown_tx),
            sender_task,
            receiver_task,
        })
    }

    /// Best-effort close: ask the sender to send a close frame, then stop
    /// both tasks. Safe to call after the connection already died.
    pub async fn close(mut self) {
        self.state.transport_open.store(false, Ordering::Release);

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.sender_task).await;

        // The receiver ends when the server answers the close frame; abort
        // covers a server that never does (no timeouts anywhere else).
        self.receiver_task.abort();
        let _ = (&mut self.receiver_task).await;

        info!("Transport closed");
    }

    /// Transmission gate: forwards each block iff its aggregate silence flag
    /// is false and the transport is open; everything else is dropped.
    async fn sender_loop(
        mut sink: SplitSink<WsStream, Message>,
        mut blocks: UnboundedReceiver<EncodedBlock>,
        mut shutdown: oneshot::Receiver<()>,
        state: Arc<AppState>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                block = blocks.recv() => {
                    let Some(block) = block else {
                        // Capture side gone: the session is shutting down.
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    };

                    if block.is_silent {
                        state.blocks_gated.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    if !state.transport_open.load(Ordering::Acquire) {
                        state.blocks_dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("Transport not open, dropping block");
                        continue;
                    }

                    match sink.send(Message::Binary(block.to_wire_bytes())).await {
                        Ok(()) => {
                            state.blocks_sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            state.blocks_dropped.fetch_add(1, Ordering::Relaxed);
                            state.transport_open.store(false, Ordering::Release);
                            warn!("Failed to send block: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Decodes inbound binary messages and appends them to the playback
    /// queue in arrival order.
    async fn receiver_loop<S: BlockSink>(
        mut stream: SplitStream<WsStream>,
        playback: PlaybackQueue<S>,
        state: Arc<AppState>,
    ) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Binary(data)) => {
                    if let Some(samples) = decode_pcm16(&data) {
                        playback.enqueue(samples);
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Server closed the connection");
                    break;
                }
                Ok(_) => {
                    // Text/ping/pong frames carry no audio.
                }
                Err(e) => {
                    warn!("Transport read error: {}", e);
                    break;
                }
            }
        }

        state.transport_open.store(false, Ordering::Release);
    }
}
