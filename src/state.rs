//! Shared session state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// State shared between the capture channel, the transmission gate and the
/// session coordinator. Plain atomics: every field is touched from at most
/// two threads and none of them needs a lock.
#[derive(Default)]
pub struct AppState {
    /// True while the WebSocket is open and writable.
    pub transport_open: AtomicBool,

    /// Blocks forwarded to the service.
    pub blocks_sent: AtomicU64,

    /// Blocks suppressed by the silence gate.
    pub blocks_gated: AtomicU64,

    /// Blocks dropped because the transport was not open or the send failed.
    pub blocks_dropped: AtomicU64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line traffic summary for the end-of-session log.
    pub fn summary(&self) -> String {
        format!(
            "sent {} blocks, gated {}, dropped {}",
            self.blocks_sent.load(Ordering::Relaxed),
            self.blocks_gated.load(Ordering::Relaxed),
            self.blocks_dropped.load(Ordering::Relaxed),
        )
    }
}
