//! Playback-side decoding: raw 16-bit PCM bytes → float samples.

use tracing::warn;

/// Decode one inbound message into float samples in [-1, 1].
///
/// Returns `None` for an empty message, which is a warning condition, not an
/// error: playback continues unaffected. An odd trailing byte cannot form a
/// sample and is discarded.
pub fn decode_pcm16(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() {
        warn!("Received empty audio message");
        return None;
    }

    if bytes.len() % 2 != 0 {
        warn!("Received audio message with odd length {}, truncating", bytes.len());
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32767.0)
        .collect();

    if samples.is_empty() {
        // A single stray byte decodes to nothing.
        return None;
    }

    Some(samples)
}
