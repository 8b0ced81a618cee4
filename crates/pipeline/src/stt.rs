//! Speech-to-text interface

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use call_agent_core::{SampleRate, TranscriptResult};

use crate::PipelineError;

/// One utterance to transcribe
#[derive(Debug, Clone)]
pub struct SttRequest {
    pub samples: Vec<i16>,
    pub sample_rate: SampleRate,
    /// IETF language tag, e.g. "de-DE"
    pub language_hint: Option<String>,
    /// Dialect detected on a previous utterance, if any
    pub dialect_hint: Option<String>,
}

impl SttRequest {
    pub fn new(samples: Vec<i16>, sample_rate: SampleRate) -> Self {
        Self {
            samples,
            sample_rate,
            language_hint: None,
            dialect_hint: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_hint = Some(language.into());
        self
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect_hint = Some(dialect.into());
        self
    }
}

/// Speech recognizer interface
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, request: SttRequest) -> Result<TranscriptResult, PipelineError>;
}

/// Scripted recognizer for tests and local development.
///
/// Returns queued results in order; records received hints so dialect
/// routing can be asserted.
pub struct ScriptedStt {
    results: Mutex<VecDeque<TranscriptResult>>,
    seen_hints: Mutex<Vec<(Option<String>, Option<String>)>>,
    /// When set, every call fails with `SttUnavailable`
    pub fail: std::sync::atomic::AtomicBool,
}

impl ScriptedStt {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            seen_hints: Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Queue the next transcription result
    pub fn push_result(&self, result: TranscriptResult) {
        self.results.lock().push_back(result);
    }

    /// Queue a plain text result with the given confidence
    pub fn push_text(&self, text: &str, confidence: f32) {
        self.push_result(TranscriptResult::new(text, confidence).with_language("de"));
    }

    /// Hints seen so far, in call order
    pub fn seen_hints(&self) -> Vec<(Option<String>, Option<String>)> {
        self.seen_hints.lock().clone()
    }
}

impl Default for ScriptedStt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, request: SttRequest) -> Result<TranscriptResult, PipelineError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PipelineError::SttUnavailable("scripted failure".to_string()));
        }

        self.seen_hints
            .lock()
            .push((request.language_hint.clone(), request.dialect_hint.clone()));

        let duration_ms =
            (request.samples.len() as u64 * 1000) / request.sample_rate.as_hz() as u64;

        let result = self
            .results
            .lock()
            .pop_front()
            .unwrap_or_else(|| TranscriptResult::new("", 0.0));
        Ok(result.with_duration(duration_ms))
    }
}

/// Routes between recognizers by dialect hint.
///
/// Orthogonal to the conversation flow: a session that learns the caller's
/// dialect passes it on the next request and transparently reaches the
/// specialized engine.
pub struct DialectRoutingStt {
    default_engine: Arc<dyn SpeechToText>,
    dialect_engines: Vec<(String, Arc<dyn SpeechToText>)>,
}

impl DialectRoutingStt {
    pub fn new(default_engine: Arc<dyn SpeechToText>) -> Self {
        Self {
            default_engine,
            dialect_engines: Vec::new(),
        }
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>, engine: Arc<dyn SpeechToText>) -> Self {
        self.dialect_engines.push((dialect.into(), engine));
        self
    }
}

#[async_trait]
impl SpeechToText for DialectRoutingStt {
    async fn transcribe(&self, request: SttRequest) -> Result<TranscriptResult, PipelineError> {
        if let Some(ref dialect) = request.dialect_hint {
            for (name, engine) in &self.dialect_engines {
                if name == dialect {
                    return engine.transcribe(request).await;
                }
            }
        }
        self.default_engine.transcribe(request).await
    }
}
