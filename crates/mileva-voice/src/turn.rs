//! Turn detection: how long to wait after the participant stops speaking
//! before the agent takes its turn.

use std::time::Duration;

/// End-of-utterance likelihood below which the longer delay applies.
const UNLIKELY_THRESHOLD: f32 = 0.15;

/// Words that usually mean the speaker has more to say.
const CONTINUATION_WORDS: [&str; 14] = [
    "and", "but", "or", "so", "because", "um", "uh", "like", "then", "if", "the", "a", "to",
    "with",
];

/// Bounds on the endpointing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointingOptions {
    /// Delay once the utterance looks complete.
    pub min_delay: Duration,
    /// Delay while the utterance looks unfinished.
    pub max_delay: Duration,
}

impl Default for EndpointingOptions {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(6),
        }
    }
}

/// Strategy used to decide when a user turn is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDetection {
    /// The turn ends a fixed delay after the VAD reports end of speech.
    VadOnly(EndpointingOptions),
    /// The delay depends on whether the transcript reads as finished, in any
    /// language that marks sentence ends with punctuation.
    Multilingual(EndpointingOptions),
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::Multilingual(EndpointingOptions::default())
    }
}

impl TurnDetection {
    pub fn multilingual() -> Self {
        Self::default()
    }

    pub fn options(&self) -> EndpointingOptions {
        match self {
            Self::VadOnly(options) | Self::Multilingual(options) => *options,
        }
    }

    /// How long to wait after end of speech given the transcript so far.
    pub fn endpointing_delay(&self, transcript: &str) -> Duration {
        match self {
            Self::VadOnly(options) => options.min_delay,
            Self::Multilingual(options) => {
                if end_of_utterance_probability(transcript) < UNLIKELY_THRESHOLD {
                    options.max_delay
                } else {
                    options.min_delay
                }
            }
        }
    }
}

/// Heuristic likelihood that `transcript` is a complete utterance.
pub fn end_of_utterance_probability(transcript: &str) -> f32 {
    let trimmed = transcript.trim_end();
    let Some(last) = trimmed.chars().last() else {
        return 0.0;
    };

    if matches!(last, '.' | '?' | '!' | '。' | '？' | '！' | '…') {
        return 0.95;
    }
    if matches!(last, ',' | ';' | ':' | '-' | '、' | '，') {
        return 0.05;
    }

    let last_word = trimmed
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if CONTINUATION_WORDS.contains(&last_word.as_str()) {
        return 0.05;
    }

    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_sentence_uses_min_delay() {
        let turn = TurnDetection::multilingual();
        assert_eq!(
            turn.endpointing_delay("Yeah, now is fine."),
            Duration::from_millis(500)
        );
        assert_eq!(turn.endpointing_delay("今は大丈夫です。"), Duration::from_millis(500));
    }

    #[test]
    fn trailing_conjunction_waits_longer() {
        let turn = TurnDetection::multilingual();
        assert_eq!(
            turn.endpointing_delay("We spend hours on invoicing and"),
            Duration::from_secs(6)
        );
        assert_eq!(turn.endpointing_delay("Well, um"), Duration::from_secs(6));
        assert_eq!(turn.endpointing_delay("so,"), Duration::from_secs(6));
    }

    #[test]
    fn unpunctuated_tail_is_treated_as_complete() {
        let turn = TurnDetection::multilingual();
        assert_eq!(
            turn.endpointing_delay("sounds good"),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn vad_only_ignores_transcript() {
        let turn = TurnDetection::VadOnly(EndpointingOptions::default());
        assert_eq!(turn.endpointing_delay("and"), Duration::from_millis(500));
    }

    #[test]
    fn empty_transcript_is_unlikely_end() {
        assert_eq!(end_of_utterance_probability("   "), 0.0);
    }
}
