//! Playback queue driver and the cpal-backed output sink.
//!
//! Arriving decoded blocks are serialized into continuous output by an
//! explicit two-state machine: `Idle` ⇄ `Playing`, with exactly one block in
//! flight at a time and strict FIFO order. Completion events come from the
//! output device's callback thread, never recursively.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use dasp_sample::FromSample;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Callback invoked exactly once when a block finishes playing.
pub type OnComplete = Box<dyn FnOnce() + Send>;

/// A playback device capability: accepts one float block plus its target
/// sample rate, plays it to completion, then signals completion.
pub trait BlockSink: Send + Sync + 'static {
    fn play(&self, block: Vec<f32>, sample_rate: u32, on_complete: OnComplete);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Idle,
    Playing,
}

struct QueueSlot {
    blocks: VecDeque<Vec<f32>>,
    state: DriverState,
}

struct QueueInner<S> {
    sink: S,
    sample_rate: u32,
    slot: Mutex<QueueSlot>,
}

/// FIFO driver over a [`BlockSink`].
///
/// `enqueue` appends and kicks the driver when idle; `advance` hands the
/// next block to the sink with a completion callback that advances again.
/// Completion callbacks arriving after [`PlaybackQueue::clear`] find an empty
/// queue and settle back to idle, so late device events are harmless.
pub struct PlaybackQueue<S: BlockSink> {
    inner: Arc<QueueInner<S>>,
}

impl<S: BlockSink> Clone for PlaybackQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: BlockSink> PlaybackQueue<S> {
    pub fn new(sink: S, sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                sink,
                sample_rate,
                slot: Mutex::new(QueueSlot {
                    blocks: VecDeque::new(),
                    state: DriverState::Idle,
                }),
            }),
        }
    }

    /// Append a decoded block; starts playback immediately when idle.
    pub fn enqueue(&self, block: Vec<f32>) {
        let kick = {
            let mut slot = self.inner.slot.lock().unwrap();
            slot.blocks.push_back(block);
            if slot.state == DriverState::Idle {
                // Claim the driver before releasing the lock so a racing
                // enqueue cannot start a second playback.
                slot.state = DriverState::Playing;
                true
            } else {
                false
            }
        };
        if kick {
            Self::advance(&self.inner);
        }
    }

    /// Discard all queued blocks. The block currently in the sink finishes
    /// on its own; its completion finds an empty queue and goes idle.
    pub fn clear(&self) {
        self.inner.slot.lock().unwrap().blocks.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.inner.slot.lock().unwrap().state == DriverState::Idle
    }

    pub fn len(&self) -> usize {
        self.inner.slot.lock().unwrap().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn advance(inner: &Arc<QueueInner<S>>) {
        let block = {
            let mut slot = inner.slot.lock().unwrap();
            match slot.blocks.pop_front() {
                Some(block) => {
                    slot.state = DriverState::Playing;
                    block
                }
                None => {
                    slot.state = DriverState::Idle;
                    return;
                }
            }
        };

        let next = Arc::clone(inner);
        inner.sink.play(
            block,
            inner.sample_rate,
            Box::new(move || Self::advance(&next)),
        );
    }
}

/// The block currently being drained by the output callback.
struct CurrentBlock {
    samples: Vec<f32>,
    pos: usize,
    on_complete: Option<OnComplete>,
}

type SharedSlot = Arc<Mutex<Option<CurrentBlock>>>;

/// The [`BlockSink`] half of [`CpalPlayer`]. Holds only the shared sample
/// slot, so it can cross threads while the stream stays on its own.
#[derive(Clone)]
pub struct CpalSink {
    slot: SharedSlot,
    sample_rate: u32,
}

impl BlockSink for CpalSink {
    fn play(&self, block: Vec<f32>, sample_rate: u32, on_complete: OnComplete) {
        if sample_rate != self.sample_rate {
            warn!(
                "Playback sample rate mismatch: block {} Hz, device {} Hz",
                sample_rate, self.sample_rate
            );
        }
        if block.is_empty() {
            on_complete();
            return;
        }

        let mut slot = self.slot.lock().unwrap();
        // The driver guarantees one in-flight block.
        debug_assert!(slot.is_none(), "second block handed to a busy sink");
        *slot = Some(CurrentBlock {
            samples: block,
            pos: 0,
            on_complete: Some(on_complete),
        });
    }
}

/// Owns the cpal output stream. Dropping it releases the audio device.
///
/// The output callback drains the current block one sample per frame
/// (duplicated across device channels) and emits silence while idle, so
/// output stays continuous as long as blocks keep arriving.
pub struct CpalPlayer {
    _stream: Stream,
    sink: CpalSink,
}

impl CpalPlayer {
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .context("No output device available")?;

        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = device
            .default_output_config()
            .context("Failed to get default output config")?;

        let stream_config = StreamConfig {
            channels: supported.channels().min(2),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let slot: SharedSlot = Arc::new(Mutex::new(None));

        let stream = match supported.sample_format() {
            SampleFormat::I16 => Self::build_output_stream::<i16>(&device, &stream_config, &slot)?,
            SampleFormat::U16 => Self::build_output_stream::<u16>(&device, &stream_config, &slot)?,
            SampleFormat::F32 => Self::build_output_stream::<f32>(&device, &stream_config, &slot)?,
            format => anyhow::bail!("Unsupported output sample format: {:?}", format),
        };

        stream.play().context("Failed to start output stream")?;

        info!("Audio playback started at {} Hz", sample_rate);

        Ok(Self {
            _stream: stream,
            sink: CpalSink { slot, sample_rate },
        })
    }

    /// Handle for the playback queue; stays valid until the player is dropped.
    pub fn sink(&self) -> CpalSink {
        self.sink.clone()
    }

    fn build_output_stream<T>(
        device: &Device,
        config: &StreamConfig,
        slot: &SharedSlot,
    ) -> Result<Stream>
    where
        T: cpal::SizedSample + FromSample<f32>,
    {
        let channels = config.channels.max(1) as usize;
        let slot = Arc::clone(slot);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = T::from_sample(Self::next_sample(&slot).unwrap_or(0.0));
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                    }
                },
                move |err| {
                    error!("Audio playback error: {}", err);
                },
                None,
            )
            .context("Failed to build output stream")?;

        Ok(stream)
    }

    /// Pop one sample from the current block. Firing the completion happens
    /// outside the slot lock: the callback re-enters the driver, which may
    /// immediately hand over the next block, keeping output gap-free.
    fn next_sample(slot: &SharedSlot) -> Option<f32> {
        let (sample, completed) = {
            let mut guard = slot.lock().unwrap();
            match guard.as_mut() {
                Some(block) => {
                    let sample = block.samples.get(block.pos).copied();
                    block.pos += 1;
                    if block.pos >= block.samples.len() {
                        let on_complete = block.on_complete.take();
                        *guard = None;
                        (sample, on_complete)
                    } else {
                        (sample, None)
                    }
                }
                None => (None, None),
            }
        };

        if let Some(on_complete) = completed {
            on_complete();
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records play calls and lets the test fire completions by hand.
    struct MockSink {
        played: Mutex<Vec<Vec<f32>>>,
        pending: Mutex<Vec<OnComplete>>,
    }

    impl MockSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                played: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
            })
        }

        fn play_count(&self) -> usize {
            self.played.lock().unwrap().len()
        }

        fn in_flight(&self) -> usize {
            self.pending.lock().unwrap().len()
        }

        fn finish_one(&self) {
            let cb = self.pending.lock().unwrap().remove(0);
            cb();
        }
    }

    impl BlockSink for Arc<MockSink> {
        fn play(&self, block: Vec<f32>, _sample_rate: u32, on_complete: OnComplete) {
            self.played.lock().unwrap().push(block);
            self.pending.lock().unwrap().push(on_complete);
        }
    }

    #[test]
    fn test_enqueue_while_idle_starts_playback() {
        let sink = MockSink::new();
        let queue = PlaybackQueue::new(sink.clone(), 24_000);

        assert!(queue.is_idle());
        queue.enqueue(vec![0.1, 0.2]);
        assert!(!queue.is_idle());
        assert_eq!(sink.play_count(), 1);
    }

    #[test]
    fn test_sequential_playback_in_order() {
        let sink = MockSink::new();
        let queue = PlaybackQueue::new(sink.clone(), 24_000);

        for i in 0..3 {
            queue.enqueue(vec![i as f32]);
        }

        // Only one block in flight even with three queued.
        assert_eq!(sink.play_count(), 1);
        assert_eq!(sink.in_flight(), 1);

        sink.finish_one();
        assert_eq!(sink.play_count(), 2);
        sink.finish_one();
        assert_eq!(sink.play_count(), 3);
        sink.finish_one();
        assert_eq!(sink.play_count(), 3);
        assert!(queue.is_idle());

        let played = sink.played.lock().unwrap();
        assert_eq!(*played, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_enqueue_during_playback_does_not_overlap() {
        let sink = MockSink::new();
        let queue = PlaybackQueue::new(sink.clone(), 24_000);

        queue.enqueue(vec![1.0]);
        queue.enqueue(vec![2.0]);
        assert_eq!(sink.play_count(), 1);
        assert_eq!(queue.len(), 1);

        sink.finish_one();
        assert_eq!(sink.play_count(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_late_completion_after_clear_is_noop() {
        let sink = MockSink::new();
        let queue = PlaybackQueue::new(sink.clone(), 24_000);

        queue.enqueue(vec![1.0]);
        queue.enqueue(vec![2.0]);
        queue.clear();

        // The in-flight block finishes after teardown cleared the queue.
        sink.finish_one();
        assert_eq!(sink.play_count(), 1);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_idle_after_drain_then_restarts() {
        let sink = MockSink::new();
        let queue = PlaybackQueue::new(sink.clone(), 24_000);

        queue.enqueue(vec![1.0]);
        sink.finish_one();
        assert!(queue.is_idle());

        queue.enqueue(vec![2.0]);
        assert_eq!(sink.play_count(), 2);
    }
}
