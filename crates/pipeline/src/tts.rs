//! Text-to-speech interface

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use call_agent_core::{AudioFrame, SampleRate};

use crate::PipelineError;

/// Synthesizer interface.
///
/// The returned channel delivers PCM frames; dropping the receiver cancels
/// synthesis at the next frame boundary. Implementations must produce the
/// first frame within the configured time-to-first-byte budget, and total
/// audio must not exceed `text length x 200 ms` as a sanity guard.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<mpsc::Receiver<AudioFrame>, PipelineError>;
}

/// Scripted synthesizer emitting silence frames sized to the text.
///
/// Frame pacing is immediate; duration is derived from word count so tests
/// can reason about playback length.
pub struct ScriptedTts {
    /// When set, every call fails with `TtsTransientFailure`
    pub fail: AtomicBool,
    frame_ms: u32,
}

impl ScriptedTts {
    pub fn new(frame_ms: u32) -> Self {
        Self {
            fail: AtomicBool::new(false),
            frame_ms,
        }
    }

    fn frames_for(&self, text: &str) -> u64 {
        // Roughly 80 ms of audio per word, bounded by the sanity guard
        let words = text.split_whitespace().count().max(1) as u64;
        let duration_ms = (words * 80).min(text.len() as u64 * 200);
        (duration_ms / self.frame_ms as u64).max(1)
    }
}

impl Default for ScriptedTts {
    fn default() -> Self {
        Self::new(20)
    }
}

#[async_trait]
impl TextToSpeech for ScriptedTts {
    async fn synthesize(&self, text: &str) -> Result<mpsc::Receiver<AudioFrame>, PipelineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::TtsTransientFailure(
                "scripted failure".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        let frames = self.frames_for(text);
        let frame_ms = self.frame_ms;
        let samples_per_frame = (16_000 * frame_ms as usize) / 1000;

        tokio::spawn(async move {
            for seq in 0..frames {
                let frame = AudioFrame::new(
                    vec![0i16; samples_per_frame],
                    SampleRate::Hz16000,
                    seq,
                    seq * frame_ms as u64,
                );
                // Receiver dropped: synthesis cancelled at frame boundary
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthesis_delivers_frames() {
        let tts = ScriptedTts::new(20);
        let mut rx = tts.synthesize("Guten Tag, wie kann ich helfen?").await.unwrap();

        let mut frames = 0;
        while rx.recv().await.is_some() {
            frames += 1;
        }
        assert!(frames > 0);
    }

    #[tokio::test]
    async fn test_cancel_by_dropping_receiver() {
        let tts = ScriptedTts::new(20);
        let rx = tts.synthesize("Ein sehr langer Satz der abgebrochen wird").await.unwrap();
        drop(rx);
        // The spawned task must terminate; nothing to assert beyond no panic
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn test_transient_failure() {
        let tts = ScriptedTts::new(20);
        tts.fail.store(true, Ordering::SeqCst);

        assert!(matches!(
            tts.synthesize("Hallo").await,
            Err(PipelineError::TtsTransientFailure(_))
        ));
    }
}
