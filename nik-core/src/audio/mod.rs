//! Audio input for the voice-capture producer.
//!
//! The capture thread owns an `AudioSource` and asks it for one phrase at a
//! time. The cpal-backed source lives in [`microphone`]; tests and headless
//! hosts plug in their own.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so sources are built by a
//! factory closure *on* the capture thread and dropped there too.

pub mod phrase;
pub mod wav;

#[cfg(feature = "audio-cpal")]
pub mod microphone;

use std::time::Duration;

use crate::error::Result;

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration of this clip in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// How long a single `listen` call may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenWindow {
    /// Give up if no phrase *starts* within this time.
    pub timeout: Duration,
    /// Cut a phrase off once it has run this long.
    pub phrase_limit: Duration,
}

/// Phrase-at-a-time audio input.
pub trait AudioSource {
    /// Block until one phrase was captured (`Some`), nothing was heard before
    /// `window.timeout` (`None`), or `keep_going` turned `false` (`None`).
    ///
    /// # Errors
    /// `NikError::DeviceUnavailable` when the device is gone; the capture
    /// producer disables voice input in response.
    fn listen(&mut self, window: ListenWindow, keep_going: &dyn Fn() -> bool) -> Result<Option<AudioClip>>;
}

/// Root-mean-square level of a sample slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rms_of_square_wave() {
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert_relative_eq!(rms(&samples), 0.5, epsilon = 1e-5);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn clip_duration() {
        let clip = AudioClip::new(vec![0.0; 8_000], 16_000);
        assert_relative_eq!(clip.duration_secs(), 0.5);
        assert_eq!(AudioClip::new(vec![], 0).duration_secs(), 0.0);
    }
}
