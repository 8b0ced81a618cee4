//! Audio frame types
//!
//! The pipeline works on 16 kHz mono 16-bit PCM. Telephony adapters are
//! responsible for resampling provider audio into this format.

use serde::{Deserialize, Serialize};

/// Supported sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz8000,
    Hz16000,
    Hz44100,
    Hz48000,
}

impl SampleRate {
    /// Samples per second
    pub fn as_hz(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8_000,
            SampleRate::Hz16000 => 16_000,
            SampleRate::Hz44100 => 44_100,
            SampleRate::Hz48000 => 48_000,
        }
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8_000 => Some(SampleRate::Hz8000),
            16_000 => Some(SampleRate::Hz16000),
            44_100 => Some(SampleRate::Hz44100),
            48_000 => Some(SampleRate::Hz48000),
            _ => None,
        }
    }
}

/// Channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    Mono,
    Stereo,
}

/// A single PCM audio frame (10-30 ms of audio)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// 16-bit PCM samples
    pub samples: Vec<i16>,
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Channel layout
    pub channels: Channels,
    /// Monotonic sequence number within the call
    pub seq: u64,
    /// Timestamp in milliseconds from stream start
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Create a new frame
    pub fn new(samples: Vec<i16>, sample_rate: SampleRate, seq: u64, timestamp_ms: u64) -> Self {
        Self {
            samples,
            sample_rate,
            channels: Channels::Mono,
            seq,
            timestamp_ms,
        }
    }

    /// Frame duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate.as_hz() as u64
    }

    /// Root-mean-square energy in decibels relative to full scale
    pub fn energy_db(&self) -> f32 {
        if self.samples.is_empty() {
            return f32::NEG_INFINITY;
        }

        let sum_sq: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let norm = s as f64 / i16::MAX as f64;
                norm * norm
            })
            .sum();

        let rms = (sum_sq / self.samples.len() as f64).sqrt();
        if rms <= 0.0 {
            return f32::NEG_INFINITY;
        }

        (20.0 * rms.log10()) as f32
    }

    /// Check if frame is effectively silence
    pub fn is_silence(&self, threshold_db: f32) -> bool {
        self.energy_db() < threshold_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        // 320 samples at 16 kHz = 20 ms
        let frame = AudioFrame::new(vec![0i16; 320], SampleRate::Hz16000, 0, 0);
        assert_eq!(frame.duration_ms(), 20);
    }

    #[test]
    fn test_silence_detection() {
        let silent = AudioFrame::new(vec![0i16; 320], SampleRate::Hz16000, 0, 0);
        assert!(silent.is_silence(-40.0));

        let loud = AudioFrame::new(vec![i16::MAX / 2; 320], SampleRate::Hz16000, 0, 0);
        assert!(!loud.is_silence(-40.0));
    }

    #[test]
    fn test_energy_of_full_scale() {
        let frame = AudioFrame::new(vec![i16::MAX; 320], SampleRate::Hz16000, 0, 0);
        assert!(frame.energy_db() > -1.0);
    }
}
