//! Playing speech artifacts on the output device.

use super::synth::SpeechArtifact;
use crate::error::Result;

/// Audio output backend.
pub trait AudioPlayer: Send + Sync + 'static {
    /// Play the artifact at `volume` (0.0–1.0) and block until it finishes.
    fn play(&self, artifact: &SpeechArtifact, volume: f32) -> Result<()>;
}

/// Linear-interpolation resample. Speech tolerates the aliasing.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor().max(1.0) as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

#[cfg(feature = "audio-cpal")]
pub use cpal_player::CpalPlayer;

#[cfg(feature = "audio-cpal")]
mod cpal_player {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };
    use std::time::{Duration, Instant};

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    };
    use tracing::{debug, error};

    use super::{resample_linear, AudioPlayer};
    use crate::audio::wav::read_wav_mono;
    use crate::error::{NikError, Result};
    use crate::voice::synth::SpeechArtifact;

    /// Extra wait beyond the clip length before giving up on the device.
    const COMPLETION_SLACK: Duration = Duration::from_millis(500);
    const POLL: Duration = Duration::from_millis(20);

    /// Plays WAV artifacts on the default output device.
    ///
    /// The device is resolved per call, so a headset plugged in mid-session is
    /// picked up on the next reply.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct CpalPlayer;

    impl CpalPlayer {
        pub fn new() -> Self {
            Self
        }
    }

    struct Cursor {
        samples: Arc<Vec<f32>>,
        position: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
    }

    impl AudioPlayer for CpalPlayer {
        fn play(&self, artifact: &SpeechArtifact, volume: f32) -> Result<()> {
            let clip = read_wav_mono(artifact.path())?;
            if clip.is_empty() {
                return Ok(());
            }

            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| NikError::Playback("no output device".into()))?;
            let supported = device
                .default_output_config()
                .map_err(|e| NikError::Playback(e.to_string()))?;
            let config: StreamConfig = supported.config();
            let rate = config.sample_rate.0;

            let gain = volume.clamp(0.0, 1.0);
            let samples: Vec<f32> = resample_linear(&clip.samples, clip.sample_rate, rate)
                .into_iter()
                .map(|s| s * gain)
                .collect();
            let total = samples.len();

            let finished = Arc::new(AtomicBool::new(false));
            let cursor = Cursor {
                samples: Arc::new(samples),
                position: Arc::new(AtomicUsize::new(0)),
                finished: Arc::clone(&finished),
            };

            let stream = match supported.sample_format() {
                SampleFormat::F32 => build_output::<f32>(&device, &config, cursor),
                SampleFormat::I16 => build_output::<i16>(&device, &config, cursor),
                SampleFormat::U16 => build_output::<u16>(&device, &config, cursor),
                other => Err(NikError::Playback(format!("unsupported sample format: {other:?}"))),
            }?;
            stream.play().map_err(|e| NikError::Playback(e.to_string()))?;

            let deadline = Instant::now()
                + Duration::from_secs_f64(total as f64 / f64::from(rate.max(1)))
                + COMPLETION_SLACK;
            while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
                std::thread::sleep(POLL);
            }
            drop(stream);
            debug!(samples = total, rate, "playback complete");
            Ok(())
        }
    }

    fn build_output<T>(device: &cpal::Device, config: &StreamConfig, cursor: Cursor) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(config.channels.max(1));
        let Cursor {
            samples,
            position,
            finished,
        } = cursor;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let value = samples.get(pos).copied().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = T::from_sample(value);
                        }
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                    if pos >= samples.len() {
                        finished.store(true, Ordering::Release);
                    }
                },
                |err| error!("playback stream error: {err}"),
                None,
            )
            .map_err(|e| NikError::Playback(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_and_halving() {
        let ramp: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(resample_linear(&ramp, 16_000, 16_000), ramp);

        let half = resample_linear(&ramp, 16_000, 8_000);
        assert_eq!(half, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn upsampling_interpolates() {
        let up = resample_linear(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(up.len(), 4);
        assert!((up[1] - 0.5).abs() < 1e-6);
        // Past the end holds the last sample.
        assert!((up[3] - 1.0).abs() < 1e-6);
    }
}
