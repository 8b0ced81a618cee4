//! Transcript types for STT output

use serde::{Deserialize, Serialize};

/// Transcript result from STT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Transcribed text
    pub text: String,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// Detected language (ISO 639-1 code)
    pub language: Option<String>,

    /// Detected dialect, if the recognizer reports one
    pub dialect: Option<String>,

    /// Utterance duration in milliseconds
    pub duration_ms: u64,
}

impl TranscriptResult {
    /// Create a new transcript result
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            language: None,
            dialect: None,
            duration_ms: 0,
        }
    }

    /// Set language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set dialect
    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    /// Set utterance duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Check if transcript is empty
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Get word count
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

impl Default for TranscriptResult {
    fn default() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            language: None,
            dialect: None,
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_result() {
        let result = TranscriptResult::new("Meine Heizung ist kalt", 0.92)
            .with_language("de")
            .with_duration(1800);

        assert_eq!(result.word_count(), 4);
        assert_eq!(result.duration_ms, 1800);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_empty_transcript() {
        let result = TranscriptResult::new("   ", 0.1);
        assert!(result.is_empty());
    }
}
