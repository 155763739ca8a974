//! Silence gate: suppresses transmission of sustained low-amplitude audio.

/// Gate state, updated once per captured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Speech,
    Silent,
}

/// A consecutive-silent-block counter with a configurable trip point.
///
/// A single silent block never gates; transmission is only suppressed after
/// `silence_frames` silent blocks in a row, so speech onsets and short pauses
/// survive. Any non-silent block resets the counter immediately.
pub struct SilenceGate {
    enabled: bool,
    silence_frames: usize,
    silent_count: usize,
    state: GateState,
}

impl SilenceGate {
    pub fn new(enabled: bool, silence_frames: usize) -> Self {
        Self {
            enabled,
            // A trip point of zero would gate everything including speech.
            silence_frames: silence_frames.max(1),
            silent_count: 0,
            state: GateState::Silent,
        }
    }

    /// Feed one block's silence classification and return the aggregate
    /// flag for that block: `true` means the block should not be sent.
    pub fn update(&mut self, block_is_silent: bool) -> bool {
        if !self.enabled {
            self.state = GateState::Speech;
            return false;
        }

        if block_is_silent {
            self.silent_count += 1;
        } else {
            self.silent_count = 0;
        }

        // Recomputed on every block: a fresh gate must not carry its
        // initial state into the first blocks it classifies.
        self.state = if self.silent_count >= self.silence_frames {
            GateState::Silent
        } else {
            GateState::Speech
        };

        self.state == GateState::Silent
    }

    pub fn state(&self) -> GateState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_silent_block_does_not_gate() {
        let mut gate = SilenceGate::new(true, 5);

        for _ in 0..4 {
            assert!(!gate.update(true));
        }
        // A loud block before the trip point resets the counter.
        assert!(!gate.update(false));
        assert_eq!(gate.state(), GateState::Speech);
    }

    #[test]
    fn test_fresh_gate_lets_early_silence_through() {
        // Ten silent blocks from a brand-new gate with a trip point of
        // five: the first four pass, the fifth and onward are gated.
        let mut gate = SilenceGate::new(true, 5);

        for i in 1..=10 {
            assert_eq!(gate.update(true), i >= 5, "block {}", i);
        }
    }

    #[test]
    fn test_sustained_silence_gates() {
        let mut gate = SilenceGate::new(true, 3);

        assert!(!gate.update(true));
        assert!(!gate.update(true));
        assert!(gate.update(true)); // third consecutive silent block trips
        assert!(gate.update(true)); // and stays tripped
        assert_eq!(gate.state(), GateState::Silent);

        // Speech resets and the count starts over.
        assert!(!gate.update(false));
        assert!(!gate.update(true));
        assert!(!gate.update(true));
        assert!(gate.update(true));
    }

    #[test]
    fn test_disabled_gate_never_trips() {
        let mut gate = SilenceGate::new(false, 1);

        for _ in 0..100 {
            assert!(!gate.update(true));
        }
        assert_eq!(gate.state(), GateState::Speech);
    }

    #[test]
    fn test_zero_frame_threshold_clamped() {
        let mut gate = SilenceGate::new(true, 0);

        assert!(!gate.update(false));
        assert!(gate.update(true));
    }
}
