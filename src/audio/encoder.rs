//! Capture-side block encoding: float samples → 16-bit PCM plus a silence flag.

use crate::audio::gate::SilenceGate;
use crate::config::Config;

/// One encoded capture block, ready for the transmission gate.
///
/// `is_silent` is the aggregate gate flag, not this block's own
/// classification: it only turns true after sustained silence.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBlock {
    pub pcm: Vec<i16>,
    pub is_silent: bool,
}

impl EncodedBlock {
    /// Raw little-endian wire bytes. This is the whole wire format: no
    /// framing, no length prefix, message boundary = block boundary.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pcm.len() * 2);
        for sample in &self.pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

/// A processing unit invoked once per captured block.
///
/// Returns `None` when the input produces no output (e.g. an empty block);
/// the caller must keep its processing loop alive either way.
pub trait BlockProcessor: Send {
    fn process(&mut self, input: &[f32]) -> Option<EncodedBlock>;
}

/// Converts float blocks in [-1, 1] to 16-bit PCM and classifies silence.
///
/// Each sample is clipped to [-1, 1] and scaled by 32767; the block's peak
/// absolute amplitude (after clipping) is compared against the configured
/// threshold, and the result is fed through the [`SilenceGate`].
pub struct Pcm16Encoder {
    silence_threshold: f32,
    gate: SilenceGate,
}

impl Pcm16Encoder {
    pub fn new(config: &Config) -> Self {
        Self {
            silence_threshold: config.silence_threshold,
            gate: SilenceGate::new(config.silence_detection, config.silence_frames),
        }
    }
}

impl BlockProcessor for Pcm16Encoder {
    fn process(&mut self, input: &[f32]) -> Option<EncodedBlock> {
        if input.is_empty() {
            return None;
        }

        let mut pcm = Vec::with_capacity(input.len());
        let mut peak = 0.0f32;

        for &sample in input {
            let clipped = sample.clamp(-1.0, 1.0);
            pcm.push((clipped * 32767.0).round() as i16);
            peak = peak.max(clipped.abs());
        }

        let block_is_silent = peak < self.silence_threshold;
        let is_silent = self.gate.update(block_is_silent);

        Some(EncodedBlock { pcm, is_silent })
    }
}
