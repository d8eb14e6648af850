//! Microphone source backed by cpal.
//!
//! The cpal input callback runs on an OS audio thread. It only downmixes to
//! mono and pushes into an SPSC ring; it never allocates, locks or blocks.
//! Phrase detection happens on the capture thread when `listen` drains the ring.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use tracing::{debug, error, info, warn};

use super::phrase::{PhraseConfig, PhraseDetector};
use super::{AudioClip, AudioSource, ListenWindow};
use crate::error::{NikError, Result};

/// Roughly 40 s of 48 kHz mono audio.
const RING_CAPACITY: usize = 1 << 21;
/// Ambient noise measured once when the microphone opens.
const CALIBRATION_WINDOW: Duration = Duration::from_secs(1);
const DRAIN_INTERVAL: Duration = Duration::from_millis(30);

/// An open input stream plus the phrase detector that consumes it.
///
/// **Not `Send`**: create and drop it on the capture thread.
pub struct MicrophoneSource {
    _stream: Stream,
    consumer: HeapCons<f32>,
    detector: PhraseDetector,
    failed: Arc<AtomicBool>,
    scratch: Vec<f32>,
    pub device_name: String,
    pub sample_rate: u32,
}

impl MicrophoneSource {
    /// Open `preferred_device` if present, otherwise the system default input.
    ///
    /// Blocks for about a second while ambient noise is measured.
    ///
    /// # Errors
    /// `NikError::DeviceUnavailable` when no input device exists or cpal
    /// cannot build the stream.
    pub fn open(preferred_device: Option<&str>, config: PhraseConfig) -> Result<Self> {
        let host = cpal::default_host();

        let preferred = preferred_device.and_then(|wanted| {
            let found = host
                .input_devices()
                .ok()?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false));
            if found.is_none() {
                warn!(device = wanted, "preferred input device not found, using default");
            }
            found
        });
        let device = preferred
            .or_else(|| host.default_input_device())
            .ok_or_else(|| NikError::DeviceUnavailable("no input device".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown input".into());

        let supported = device
            .default_input_config()
            .map_err(|e| NikError::DeviceUnavailable(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let stream_config: StreamConfig = supported.config();
        info!(device = device_name.as_str(), sample_rate, channels = stream_config.channels, "opening microphone");

        let (producer, consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let failed = Arc::new(AtomicBool::new(false));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_mono_stream::<f32>(&device, &stream_config, producer, &failed),
            SampleFormat::I16 => build_mono_stream::<i16>(&device, &stream_config, producer, &failed),
            SampleFormat::U16 => build_mono_stream::<u16>(&device, &stream_config, producer, &failed),
            other => {
                return Err(NikError::DeviceUnavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }?;
        stream
            .play()
            .map_err(|e| NikError::DeviceUnavailable(e.to_string()))?;

        let mut source = Self {
            _stream: stream,
            consumer,
            detector: PhraseDetector::new(config, sample_rate),
            failed,
            scratch: vec![0.0; 4096],
            device_name,
            sample_rate,
        };
        source.calibrate();
        Ok(source)
    }

    fn calibrate(&mut self) {
        let mut ambient = Vec::with_capacity(self.sample_rate as usize);
        let deadline = Instant::now() + CALIBRATION_WINDOW;
        while Instant::now() < deadline {
            std::thread::sleep(DRAIN_INTERVAL);
            let n = self.consumer.pop_slice(&mut self.scratch);
            ambient.extend_from_slice(&self.scratch[..n]);
        }
        self.detector.calibrate(&ambient);
        debug!(threshold = self.detector.threshold(), samples = ambient.len(), "ambient calibration done");
    }
}

impl AudioSource for MicrophoneSource {
    fn listen(&mut self, window: ListenWindow, keep_going: &dyn Fn() -> bool) -> Result<Option<AudioClip>> {
        // Audio captured while nobody was listening is stale.
        self.consumer.clear();
        self.detector.begin(window.phrase_limit);
        let started = Instant::now();

        loop {
            if self.failed.load(Ordering::Acquire) {
                return Err(NikError::DeviceUnavailable(self.device_name.clone()));
            }
            if !keep_going() {
                return Ok(None);
            }
            if !self.detector.in_phrase() && started.elapsed() >= window.timeout {
                return Ok(None);
            }

            std::thread::sleep(DRAIN_INTERVAL);
            loop {
                let n = self.consumer.pop_slice(&mut self.scratch);
                if n == 0 {
                    break;
                }
                if let Some(clip) = self.detector.push(&self.scratch[..n]) {
                    return Ok(Some(clip));
                }
            }
        }
    }
}

fn build_mono_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: HeapProd<f32>,
    failed: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let failed = Arc::clone(failed);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                    // Ring full means the capture thread is behind; drop the frame.
                    let _ = producer.try_push(sum / frame.len() as f32);
                }
            },
            move |err| {
                error!("microphone stream error: {err}");
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    failed.store(true, Ordering::Release);
                }
            },
            None,
        )
        .map_err(|e| NikError::DeviceUnavailable(e.to_string()))
}
