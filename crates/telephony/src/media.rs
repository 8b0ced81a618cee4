//! Media helpers: resampling and the outbound frame queue

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use call_agent_core::AudioFrame;

/// Linear interpolation resampler for mono 16-bit PCM.
///
/// Telephony providers commonly deliver 8 kHz; the pipeline expects 16 kHz.
pub fn resample(samples: &[i16], from_hz: u32, to_hz: u32) -> Vec<i16> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src = i as f64 * ratio;
        let idx = src.floor() as usize;
        let frac = src - idx as f64;

        let a = samples[idx.min(samples.len() - 1)] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }

    out
}

/// Bounded outbound frame queue.
///
/// The downstream path must never block longer than one frame duration: on
/// overflow the oldest queued frame is dropped and the counter incremented,
/// trading history for latency.
pub struct OutboundFrameQueue {
    frames: Mutex<VecDeque<AudioFrame>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl OutboundFrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame, dropping the oldest on overflow
    pub fn push(&self, frame: AudioFrame) {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            frames.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % 50 == 1 {
                tracing::warn!(dropped, "Outbound audio queue overflow, dropping oldest frame");
            }
        }
        frames.push_back(frame);
    }

    pub fn pop(&self) -> Option<AudioFrame> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Total frames dropped due to overflow
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::SampleRate;

    #[test]
    fn test_resample_doubles_length() {
        let input: Vec<i16> = (0..160).map(|i| i as i16).collect();
        let output = resample(&input, 8_000, 16_000);
        assert_eq!(output.len(), 320);
        // Endpoints preserved
        assert_eq!(output[0], input[0]);
    }

    #[test]
    fn test_resample_identity() {
        let input = vec![1i16, 2, 3];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<i16> = (0..320).map(|i| i as i16).collect();
        let output = resample(&input, 16_000, 8_000);
        assert_eq!(output.len(), 160);
    }

    #[test]
    fn test_queue_drops_oldest() {
        let queue = OutboundFrameQueue::new(2);
        let frame = |seq| AudioFrame::new(vec![0i16; 320], SampleRate::Hz16000, seq, seq * 20);

        queue.push(frame(1));
        queue.push(frame(2));
        queue.push(frame(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_frames(), 1);
        assert_eq!(queue.pop().unwrap().seq, 2);
        assert_eq!(queue.pop().unwrap().seq, 3);
    }
}
