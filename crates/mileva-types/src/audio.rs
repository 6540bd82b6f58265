//! PCM audio frame definitions.
//!
//! Audio travels through the agent as mono signed 16-bit PCM. An
//! `AudioFrame` is either a short slice of live participant audio (as fed to
//! the voice-activity detector) or a whole utterance (as sent to STT or
//! received from TTS).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rate used for participant audio unless a source says otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// A block of mono s16 PCM audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Interleaved samples (mono, so one sample per tick).
    pub samples: Vec<i16>,
    /// Samples per second.
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A frame of `duration` silence at `sample_rate`.
    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let count = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0; count], sample_rate)
    }

    /// Decodes little-endian s16 PCM bytes. A trailing odd byte is dropped.
    pub fn from_pcm_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Encodes the samples as little-endian s16 PCM bytes.
    pub fn to_pcm_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration of this frame. Zero if the sample rate is zero.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Root-mean-square level normalized to `0.0..=1.0`.
    pub fn rms_level(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let v = f64::from(s) / f64::from(i16::MAX);
                v * v
            })
            .sum();
        ((sum / self.samples.len() as f64).sqrt() as f32).min(1.0)
    }

    /// Appends another frame's samples. The sample rate of `self` is kept.
    pub fn extend(&mut self, other: &AudioFrame) {
        self.samples.extend_from_slice(&other.samples);
    }

    /// Converts to `to_rate` by linear interpolation.
    ///
    /// A frame with a zero sample rate has no defined timing and resamples to
    /// an empty frame.
    pub fn resample(&self, to_rate: u32) -> AudioFrame {
        if self.sample_rate == to_rate {
            return self.clone();
        }
        if self.sample_rate == 0 || to_rate == 0 || self.samples.is_empty() {
            return AudioFrame::new(Vec::new(), to_rate);
        }

        let ratio = f64::from(self.sample_rate) / f64::from(to_rate);
        let out_len = (self.samples.len() as f64 / ratio).ceil() as usize;
        let samples = (0..out_len)
            .filter_map(|i| {
                let pos = i as f64 * ratio;
                let idx = pos as usize;
                let frac = pos - idx as f64;
                match (self.samples.get(idx), self.samples.get(idx + 1)) {
                    (Some(&a), Some(&b)) => {
                        let v = f64::from(a) * (1.0 - frac) + f64::from(b) * frac;
                        Some(v.round() as i16)
                    }
                    (Some(&a), None) => Some(a),
                    _ => None,
                }
            })
            .collect();
        AudioFrame::new(samples, to_rate)
    }
}
