//! Voice-activity detection.
//!
//! A [`Vad`] is loaded once per worker process and shared read-only by every
//! session. Each session opens its own [`VadStream`], which carries the
//! mutable speech/silence bookkeeping for that conversation.

use crate::error::VoiceError;
use mileva_types::AudioFrame;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sample rates the detector accepts.
const SUPPORTED_SAMPLE_RATES: [u32; 2] = [8_000, 16_000];

/// Detector tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct VadOptions {
    /// Normalized RMS level (0, 1] at or above which a frame counts as speech.
    pub activation_threshold: f32,
    /// Continuous speech required before speech is reported as started.
    pub min_speech_duration: Duration,
    /// Continuous silence required before speech is reported as ended.
    pub min_silence_duration: Duration,
    /// Longest utterance buffered before speech is reported as ended anyway.
    pub max_speech_duration: Duration,
    /// Rate the detector works at. Frames at other rates are resampled.
    pub sample_rate: u32,
}

impl Default for VadOptions {
    fn default() -> Self {
        Self {
            activation_threshold: 0.02,
            min_speech_duration: Duration::from_millis(50),
            min_silence_duration: Duration::from_millis(550),
            max_speech_duration: Duration::from_secs(60),
            sample_rate: mileva_types::audio::DEFAULT_SAMPLE_RATE,
        }
    }
}

/// What a frame changed about the speaker's state.
#[derive(Debug, Clone, PartialEq)]
pub enum VadEvent {
    /// The participant started speaking.
    StartOfSpeech,
    /// The participant stopped speaking; carries the whole utterance.
    EndOfSpeech(AudioFrame),
}

/// A loaded voice-activity detector.
#[derive(Debug)]
pub struct Vad {
    options: VadOptions,
}

impl Vad {
    /// Validates `options` and returns a detector ready to be shared.
    pub fn load(options: VadOptions) -> Result<Self, VoiceError> {
        if !(options.activation_threshold > 0.0 && options.activation_threshold <= 1.0) {
            return Err(VoiceError::Vad(format!(
                "activation threshold must be in (0, 1], got {}",
                options.activation_threshold
            )));
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&options.sample_rate) {
            return Err(VoiceError::Vad(format!(
                "unsupported sample rate {} (supported: {:?})",
                options.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        if options.min_silence_duration.is_zero() {
            return Err(VoiceError::Vad(
                "min silence duration must be positive".to_string(),
            ));
        }
        if options.max_speech_duration <= options.min_speech_duration {
            return Err(VoiceError::Vad(format!(
                "max speech duration {:?} must exceed min speech duration {:?}",
                options.max_speech_duration, options.min_speech_duration
            )));
        }

        info!(
            threshold = options.activation_threshold,
            sample_rate = options.sample_rate,
            "voice activity detector loaded"
        );
        Ok(Self { options })
    }

    pub fn options(&self) -> &VadOptions {
        &self.options
    }

    /// Whether a single frame is loud enough to count as speech.
    pub fn is_speech(&self, frame: &AudioFrame) -> bool {
        frame.rms_level() >= self.options.activation_threshold
    }

    /// Opens a per-session detection stream over this detector.
    pub fn stream(self: &Arc<Self>) -> VadStream {
        VadStream {
            vad: Arc::clone(self),
            speaking: false,
            voiced_run: Duration::ZERO,
            silence_run: Duration::ZERO,
            utterance: AudioFrame::new(Vec::new(), self.options.sample_rate),
            input_rate: self.options.sample_rate,
        }
    }
}

/// Per-session detection state.
#[derive(Debug)]
pub struct VadStream {
    vad: Arc<Vad>,
    speaking: bool,
    voiced_run: Duration,
    silence_run: Duration,
    utterance: AudioFrame,
    /// Last rate seen on input, for logging rate changes once.
    input_rate: u32,
}

impl VadStream {
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Feeds one frame and reports a state change, if any.
    ///
    /// Frames are converted to the detector's sample rate first, so the
    /// utterance in [`VadEvent::EndOfSpeech`] is always at that rate.
    pub fn push_frame(&mut self, frame: &AudioFrame) -> Option<VadEvent> {
        let options = self.vad.options();
        let resampled;
        let frame = if frame.sample_rate == options.sample_rate {
            frame
        } else {
            if frame.sample_rate != self.input_rate {
                debug!(
                    from = frame.sample_rate,
                    to = options.sample_rate,
                    "resampling participant audio"
                );
                self.input_rate = frame.sample_rate;
            }
            resampled = frame.resample(options.sample_rate);
            &resampled
        };

        let voiced = self.vad.is_speech(frame);
        let frame_duration = frame.duration();

        if !self.speaking {
            if !voiced {
                self.voiced_run = Duration::ZERO;
                self.utterance.samples.clear();
                return None;
            }
            self.utterance.extend(frame);
            self.voiced_run += frame_duration;
            if self.voiced_run >= options.min_speech_duration {
                self.speaking = true;
                self.silence_run = Duration::ZERO;
                return Some(VadEvent::StartOfSpeech);
            }
            return None;
        }

        self.utterance.extend(frame);
        if self.utterance.duration() >= options.max_speech_duration {
            warn!(
                max_secs = options.max_speech_duration.as_secs_f64(),
                "utterance reached max speech duration, ending it"
            );
            return Some(self.end_of_speech());
        }
        if voiced {
            self.silence_run = Duration::ZERO;
            return None;
        }

        self.silence_run += frame_duration;
        if self.silence_run < options.min_silence_duration {
            return None;
        }
        Some(self.end_of_speech())
    }

    fn end_of_speech(&mut self) -> VadEvent {
        self.speaking = false;
        self.voiced_run = Duration::ZERO;
        self.silence_run = Duration::ZERO;
        let utterance = std::mem::replace(
            &mut self.utterance,
            AudioFrame::new(Vec::new(), self.vad.options().sample_rate),
        );
        VadEvent::EndOfSpeech(utterance)
    }
}
