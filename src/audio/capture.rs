//! Microphone capture: cpal input stream → fixed-size blocks → encoder.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use dasp_sample::Sample as DaspSample;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::audio::encoder::{BlockProcessor, EncodedBlock, Pcm16Encoder};
use crate::audio::{BLOCK_SAMPLES, CHANNELS, SAMPLE_RATE};
use crate::config::Config;

/// Owns the cpal input stream. The audio callback accumulates samples into
/// fixed-size blocks, runs the encoder once per block and hands each encoded
/// block to the transmission gate over a non-blocking channel.
pub struct CaptureHandler {
    stream: Stream,
}

impl CaptureHandler {
    pub fn start(config: &Config, blocks: UnboundedSender<EncodedBlock>) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .context("No input device available")?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = device
            .default_input_config()
            .context("Failed to get default input config")?;

        let stream_config = StreamConfig {
            channels: CHANNELS,
            sample_rate: SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let encoder = Pcm16Encoder::new(config);

        let stream = match supported.sample_format() {
            SampleFormat::I16 => {
                Self::build_input_stream::<i16>(&device, &stream_config, encoder, blocks)?
            }
            SampleFormat::U16 => {
                Self::build_input_stream::<u16>(&device, &stream_config, encoder, blocks)?
            }
            SampleFormat::F32 => {
                Self::build_input_stream::<f32>(&device, &stream_config, encoder, blocks)?
            }
            format => anyhow::bail!("Unsupported input sample format: {:?}", format),
        };

        stream.play().context("Failed to start capture stream")?;

        info!(
            "Audio capture started ({} Hz mono, {}-sample blocks)",
            SAMPLE_RATE, BLOCK_SAMPLES
        );

        Ok(Self { stream })
    }

    /// Halt the capture source. The stream itself is released on drop.
    pub fn halt(&self) {
        if let Err(e) = self.stream.pause() {
            warn!("Failed to pause capture stream: {}", e);
        }
    }

    fn build_input_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut encoder: impl BlockProcessor + 'static,
        blocks: UnboundedSender<EncodedBlock>,
    ) -> Result<Stream>
    where
        T: cpal::Sample + cpal::SizedSample,
    {
        let mut buffer = Vec::with_capacity(BLOCK_SAMPLES);

        let stream = device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    for sample in data {
                        buffer.push(Self::to_f32_sample::<T>(sample));

                        if buffer.len() >= BLOCK_SAMPLES {
                            let block: Vec<f32> = buffer.drain(..BLOCK_SAMPLES).collect();
                            if let Some(encoded) = encoder.process(&block) {
                                // Send fails only during teardown once the
                                // gate side is gone; the capture loop must
                                // stay alive regardless.
                                let _ = blocks.send(encoded);
                            }
                        }
                    }
                },
                move |err| {
                    error!("Audio capture error: {}", err);
                },
                None,
            )
            .context("Failed to build input stream")?;

        Ok(stream)
    }

    fn to_f32_sample<T>(sample: &T) -> f32
    where
        T: cpal::Sample,
    {
        // Convert through f32 using dasp_sample
        sample.to_float_sample().to_sample()
    }
}
