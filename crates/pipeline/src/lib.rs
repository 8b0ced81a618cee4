//! Real-time AI pipeline
//!
//! STT/LLM/TTS stage interfaces with scripted implementations, voice
//! activity detection, the full-duplex audio bridge with barge-in, the
//! bounded priority inference pool, and retry with backoff.

pub mod bridge;
pub mod llm;
pub mod pool;
pub mod retry;
pub mod stt;
pub mod tts;
pub mod vad;

pub use bridge::{AudioBridge, BridgeConfig, BridgeEvent, BridgeState};
pub use llm::{GenerationRequest, LanguageModel, ScriptedLlm};
pub use pool::{CancelHandle, InferencePool, WorkPriority};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use stt::{DialectRoutingStt, ScriptedStt, SpeechToText, SttRequest};
pub use tts::{ScriptedTts, TextToSpeech};
pub use vad::{VadConfig, VadState, VoiceActivityDetector};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Recognizer unreachable or failed; retryable
    #[error("STT unavailable: {0}")]
    SttUnavailable(String),

    #[error("STT timed out after {0} ms")]
    SttTimeout(u64),

    /// Hard LLM timeout; the soft timeout is handled by the conversation
    /// engine falling back to a template
    #[error("LLM timed out after {0} ms")]
    LlmTimeout(u64),

    #[error("LLM failed: {0}")]
    LlmFailed(String),

    /// Transient synthesis failure; retryable
    #[error("TTS transient failure: {0}")]
    TtsTransientFailure(String),

    #[error("TTS first frame exceeded {0} ms")]
    TtsFirstFrameTimeout(u64),

    /// Inference pool rejected the work
    #[error("Inference pool overloaded")]
    Overloaded,

    #[error("Work was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Retryable per the backoff policy
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::SttUnavailable(_) | PipelineError::TtsTransientFailure(_)
        )
    }
}
