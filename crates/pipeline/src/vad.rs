//! Voice activity detection
//!
//! Energy-based detector over PCM frames with hangover timing: speech starts
//! after sustained voiced audio, an utterance ends after sustained silence.

use call_agent_core::AudioFrame;

/// VAD configuration
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Energy threshold separating speech from silence
    pub energy_threshold_db: f32,
    /// Voiced audio required before speech is declared
    pub min_speech_ms: u32,
    /// Silence required after speech before the utterance ends
    pub min_silence_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold_db: -40.0,
            min_speech_ms: 200,
            min_silence_ms: 700,
        }
    }
}

/// Detector state after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    /// Voiced audio accumulating, below the speech-start threshold
    SpeechStart,
    Speech,
    /// Utterance boundary: silence threshold reached after speech
    SpeechEnd,
}

/// Frame-level voice activity detector
pub struct VoiceActivityDetector {
    config: VadConfig,
    voiced_ms: u32,
    silence_ms: u32,
    in_speech: bool,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            voiced_ms: 0,
            silence_ms: 0,
            in_speech: false,
        }
    }

    /// Feed one frame, returning the state after it
    pub fn process_frame(&mut self, frame: &AudioFrame) -> VadState {
        let frame_ms = frame.duration_ms() as u32;
        let voiced = !frame.is_silence(self.config.energy_threshold_db);

        if voiced {
            self.voiced_ms += frame_ms;
            self.silence_ms = 0;

            if self.in_speech {
                return VadState::Speech;
            }
            if self.voiced_ms >= self.config.min_speech_ms {
                self.in_speech = true;
                return VadState::Speech;
            }
            return VadState::SpeechStart;
        }

        self.silence_ms += frame_ms;
        self.voiced_ms = 0;

        if self.in_speech && self.silence_ms >= self.config.min_silence_ms {
            self.in_speech = false;
            self.silence_ms = 0;
            return VadState::SpeechEnd;
        }
        if self.in_speech {
            // Short pause inside an utterance
            return VadState::Speech;
        }
        VadState::Silence
    }

    pub fn is_in_speech(&self) -> bool {
        self.in_speech
    }

    pub fn reset(&mut self) {
        self.voiced_ms = 0;
        self.silence_ms = 0;
        self.in_speech = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::SampleRate;

    fn voiced_frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![8_000i16; 320], SampleRate::Hz16000, seq, seq * 20)
    }

    fn silent_frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![0i16; 320], SampleRate::Hz16000, seq, seq * 20)
    }

    #[test]
    fn test_speech_starts_after_min_voiced() {
        let mut vad = VoiceActivityDetector::new(VadConfig::default());

        // 200 ms at 20 ms frames = 10 frames
        for seq in 0..9 {
            let state = vad.process_frame(&voiced_frame(seq));
            assert_ne!(state, VadState::Speech, "frame {}", seq);
        }
        assert_eq!(vad.process_frame(&voiced_frame(9)), VadState::Speech);
    }

    #[test]
    fn test_utterance_ends_after_min_silence() {
        let mut vad = VoiceActivityDetector::new(VadConfig::default());

        for seq in 0..10 {
            vad.process_frame(&voiced_frame(seq));
        }
        assert!(vad.is_in_speech());

        // 700 ms of silence = 35 frames of 20 ms
        let mut end_seen = false;
        for seq in 10..45 {
            if vad.process_frame(&silent_frame(seq)) == VadState::SpeechEnd {
                end_seen = true;
                break;
            }
        }
        assert!(end_seen);
        assert!(!vad.is_in_speech());
    }

    #[test]
    fn test_short_pause_does_not_end_utterance() {
        let mut vad = VoiceActivityDetector::new(VadConfig::default());

        for seq in 0..10 {
            vad.process_frame(&voiced_frame(seq));
        }
        // 300 ms pause, below the 700 ms threshold
        for seq in 10..25 {
            assert_ne!(vad.process_frame(&silent_frame(seq)), VadState::SpeechEnd);
        }
        assert!(vad.is_in_speech());
    }

    #[test]
    fn test_brief_noise_is_not_speech() {
        let mut vad = VoiceActivityDetector::new(VadConfig::default());

        // 60 ms blip
        for seq in 0..3 {
            vad.process_frame(&voiced_frame(seq));
        }
        assert_eq!(vad.process_frame(&silent_frame(3)), VadState::Silence);
        assert!(!vad.is_in_speech());
    }
}
