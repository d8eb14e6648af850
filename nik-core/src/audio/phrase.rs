//! Energy-based phrase segmentation.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of each incoming chunk.
//! 2. RMS ≥ threshold → speech: open (or extend) the phrase, reset the pause run.
//! 3. RMS < threshold inside a phrase → keep the audio, grow the pause run;
//!    once the run reaches `pause_threshold` the phrase is complete.
//! 4. RMS < threshold outside a phrase → background. With dynamic energy on,
//!    the threshold drifts towards `background × DYNAMIC_RATIO`.
//! 5. A phrase that reaches `phrase_limit` is cut and returned as-is.

use std::time::Duration;

use super::{rms, AudioClip};

/// Speech must be this many times louder than the background level.
pub const DYNAMIC_RATIO: f32 = 1.5;
/// Fraction of the old threshold kept per second of background audio.
const DYNAMIC_DAMPING: f32 = 0.15;
/// The adaptive threshold never drops below this.
pub const MIN_ENERGY_THRESHOLD: f32 = 0.004;

/// Segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseConfig {
    /// Initial RMS level above which a chunk counts as speech.
    pub energy_threshold: f32,
    /// Adapt the threshold to background noise between phrases.
    pub dynamic_energy: bool,
    /// Trailing silence that ends a phrase.
    pub pause_threshold: Duration,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.02,
            dynamic_energy: true,
            pause_threshold: Duration::from_millis(800),
        }
    }
}

/// Streaming phrase detector fed with arbitrary-length chunks.
#[derive(Debug, Clone)]
pub struct PhraseDetector {
    config: PhraseConfig,
    sample_rate: u32,
    threshold: f32,
    phrase: Vec<f32>,
    in_phrase: bool,
    /// Consecutive below-threshold samples inside the current phrase.
    pause_run: usize,
    limit_samples: usize,
}

impl PhraseDetector {
    pub fn new(config: PhraseConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            threshold: config.energy_threshold.max(MIN_ENERGY_THRESHOLD),
            phrase: Vec::new(),
            in_phrase: false,
            pause_run: 0,
            limit_samples: usize::MAX,
        }
    }

    /// Current speech threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// `true` once speech has started and the phrase is not yet complete.
    pub fn in_phrase(&self) -> bool {
        self.in_phrase
    }

    /// Raise the threshold above measured ambient noise.
    pub fn calibrate(&mut self, ambient: &[f32]) {
        let level = rms(ambient) * DYNAMIC_RATIO;
        self.threshold = level
            .max(self.config.energy_threshold)
            .max(MIN_ENERGY_THRESHOLD);
    }

    /// Drop any partial phrase and arm a new phrase length limit.
    pub fn begin(&mut self, phrase_limit: Duration) {
        self.phrase.clear();
        self.in_phrase = false;
        self.pause_run = 0;
        self.limit_samples = self.samples_for(phrase_limit).max(1);
    }

    /// Feed one chunk. Returns the finished phrase, if this chunk completed one.
    pub fn push(&mut self, chunk: &[f32]) -> Option<AudioClip> {
        if chunk.is_empty() {
            return None;
        }
        let level = rms(chunk);
        let is_speech = level >= self.threshold;

        if !self.in_phrase {
            if !is_speech {
                self.adapt(level, chunk.len());
                return None;
            }
            self.in_phrase = true;
        }

        self.phrase.extend_from_slice(chunk);
        if is_speech {
            self.pause_run = 0;
        } else {
            self.pause_run += chunk.len();
        }

        let paused = self.pause_run >= self.samples_for(self.config.pause_threshold);
        if paused || self.phrase.len() >= self.limit_samples {
            self.phrase.truncate(self.limit_samples);
            return Some(self.finish());
        }
        None
    }

    fn finish(&mut self) -> AudioClip {
        self.in_phrase = false;
        self.pause_run = 0;
        AudioClip::new(std::mem::take(&mut self.phrase), self.sample_rate)
    }

    fn adapt(&mut self, level: f32, samples: usize) {
        if !self.config.dynamic_energy || self.sample_rate == 0 {
            return;
        }
        let seconds = samples as f32 / self.sample_rate as f32;
        let damping = DYNAMIC_DAMPING.powf(seconds);
        let target = level * DYNAMIC_RATIO;
        self.threshold = (self.threshold * damping + target * (1.0 - damping)).max(MIN_ENERGY_THRESHOLD);
    }

    fn samples_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RATE: u32 = 1_000;

    fn detector(dynamic: bool) -> PhraseDetector {
        let mut d = PhraseDetector::new(
            PhraseConfig {
                energy_threshold: 0.05,
                dynamic_energy: dynamic,
                pause_threshold: Duration::from_millis(300),
            },
            RATE,
        );
        d.begin(Duration::from_secs(5));
        d
    }

    fn loud(ms: usize) -> Vec<f32> {
        vec![0.3; ms * RATE as usize / 1000]
    }

    fn quiet(ms: usize) -> Vec<f32> {
        vec![0.0; ms * RATE as usize / 1000]
    }

    #[test]
    fn silence_never_opens_a_phrase() {
        let mut d = detector(false);
        for _ in 0..20 {
            assert!(d.push(&quiet(100)).is_none());
        }
        assert!(!d.in_phrase());
    }

    #[test]
    fn phrase_completes_after_pause() {
        let mut d = detector(false);
        assert!(d.push(&loud(200)).is_none());
        assert!(d.in_phrase());
        assert!(d.push(&quiet(100)).is_none());
        assert!(d.push(&loud(100)).is_none());
        assert!(d.push(&quiet(200)).is_none());
        let clip = d.push(&quiet(100)).expect("phrase after 300ms pause");
        assert_eq!(clip.samples.len(), 700);
        assert_eq!(clip.sample_rate, RATE);
        assert!(!d.in_phrase());
    }

    #[test]
    fn phrase_limit_cuts_long_speech() {
        let mut d = detector(false);
        d.begin(Duration::from_millis(500));
        assert!(d.push(&loud(300)).is_none());
        let clip = d.push(&loud(300)).expect("cut at limit");
        assert_eq!(clip.samples.len(), 500);
    }

    #[test]
    fn calibration_raises_threshold_above_noise() {
        let mut d = detector(false);
        d.calibrate(&vec![0.1; 100]);
        assert_relative_eq!(d.threshold(), 0.15, epsilon = 1e-6);
        // Below the calibrated level now counts as background.
        assert!(d.push(&vec![0.12; 200]).is_none());
        assert!(!d.in_phrase());
    }

    #[test]
    fn dynamic_threshold_follows_background_down_to_floor() {
        let mut d = detector(true);
        for _ in 0..50 {
            d.push(&quiet(100));
        }
        assert_relative_eq!(d.threshold(), MIN_ENERGY_THRESHOLD, epsilon = 1e-6);

        let mut fixed = detector(false);
        fixed.push(&quiet(1000));
        assert_relative_eq!(fixed.threshold(), 0.05);
    }
}
