//! Audio data types and the capture/playback processing stages.
//!
//! Everything in this module works on fixed-size mono blocks at the
//! service's sample rate:
//!
//! # Capture side
//! - [`encoder::Pcm16Encoder`] - float → int16 conversion with peak tracking
//! - [`gate::SilenceGate`] - consecutive-silent-block state machine
//! - [`capture::CaptureHandler`] - cpal input stream feeding the encoder
//!
//! # Playback side
//! - [`decoder::decode_pcm16`] - int16 bytes → float samples
//! - [`playback::PlaybackQueue`] - FIFO driver with one in-flight block
//! - [`playback::CpalPlayer`] - cpal output stream behind [`playback::BlockSink`]

pub mod capture;
pub mod decoder;
pub mod encoder;
pub mod gate;
pub mod playback;

pub use capture::CaptureHandler;
pub use decoder::decode_pcm16;
pub use encoder::{BlockProcessor, EncodedBlock, Pcm16Encoder};
pub use gate::SilenceGate;
pub use playback::{BlockSink, CpalPlayer, CpalSink, PlaybackQueue};

/// Sample rate shared by both pipelines. Fixed by the service contract.
pub const SAMPLE_RATE: u32 = 24_000;

/// Both pipelines are mono.
pub const CHANNELS: u16 = 1;

/// Samples per capture block. One block is one processing tick and one
/// outbound message.
pub const BLOCK_SAMPLES: usize = 128;
