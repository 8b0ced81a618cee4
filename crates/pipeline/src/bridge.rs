//! Audio bridge turn state machine
//!
//! Per-session full-duplex coordinator between the telephony media stream
//! and the AI pipeline:
//!
//! ```text
//! IDLE -> LISTENING -> THINKING -> SPEAKING -> IDLE
//!              ^                       |
//!              +------ barge-in -------+
//! ```
//!
//! Barge-in: sustained user voice while SPEAKING cancels playback and
//! returns to LISTENING, unless the current prompt is marked critical.
//! When playback finishes and user audio arrived in the same window, the
//! bridge always favors the user and goes to LISTENING.

use parking_lot::Mutex;
use tokio::sync::broadcast;

use call_agent_core::AudioFrame;

use crate::vad::{VadConfig, VadState, VoiceActivityDetector};

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub vad: VadConfig,
    /// Sustained user voice during SPEAKING that triggers barge-in
    pub barge_in_threshold_ms: u32,
    /// Forced flush of accumulated audio while THINKING
    pub thinking_flush_ms: u32,
    /// Hard cap on buffered PCM, in milliseconds of audio
    pub buffer_cap_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            barge_in_threshold_ms: 300,
            thinking_flush_ms: 3_000,
            buffer_cap_ms: 60_000,
        }
    }
}

/// Bridge state per the turn-taking state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Only entered at session start and between turns
    Idle,
    /// Accumulating the caller's utterance
    Listening,
    /// Utterance handed off; awaiting the assistant's reply
    Thinking,
    /// Synthesized audio streaming out
    Speaking,
}

/// Events emitted by the bridge
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// A complete utterance is ready for STT
    UtteranceReady { samples: Vec<i16>, duration_ms: u64 },
    /// Sustained user voice during playback; the session must cancel TTS
    BargeIn,
    /// Buffer cap exceeded, oldest audio dropped
    Degraded,
    StateChanged(BridgeState),
}

struct BridgeInner {
    state: BridgeState,
    vad: VoiceActivityDetector,
    utterance: Vec<i16>,
    sample_rate_hz: u32,
    barge_in_voiced_ms: u32,
    thinking_voiced_ms: u32,
    critical_prompt: bool,
    degraded_reported: bool,
}

/// Full-duplex audio bridge for one session
pub struct AudioBridge {
    config: BridgeConfig,
    inner: Mutex<BridgeInner>,
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl AudioBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(128);
        Self {
            inner: Mutex::new(BridgeInner {
                state: BridgeState::Idle,
                vad: VoiceActivityDetector::new(config.vad.clone()),
                utterance: Vec::new(),
                sample_rate_hz: 16_000,
                barge_in_voiced_ms: 0,
                thinking_voiced_ms: 0,
                critical_prompt: false,
                degraded_reported: false,
            }),
            config,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> BridgeState {
        self.inner.lock().state
    }

    /// Feed one caller frame through the state machine
    pub fn process_frame(&self, frame: &AudioFrame) {
        let mut inner = self.inner.lock();
        inner.sample_rate_hz = frame.sample_rate.as_hz();
        let vad_state = inner.vad.process_frame(frame);
        let frame_ms = frame.duration_ms() as u32;

        match inner.state {
            BridgeState::Idle => {
                if matches!(vad_state, VadState::SpeechStart | VadState::Speech) {
                    self.buffer_frame(&mut inner, frame);
                    self.set_state(&mut inner, BridgeState::Listening);
                }
            }

            BridgeState::Listening => {
                self.buffer_frame(&mut inner, frame);

                if vad_state == VadState::SpeechEnd {
                    self.emit_utterance(&mut inner);
                    self.set_state(&mut inner, BridgeState::Thinking);
                }
            }

            BridgeState::Thinking => {
                // Audio keeps buffering but is not emitted to STT yet;
                // leading silence is not recorded
                match vad_state {
                    VadState::Speech | VadState::SpeechStart => {
                        self.buffer_frame(&mut inner, frame);
                        inner.thinking_voiced_ms += frame_ms;
                        if inner.thinking_voiced_ms >= self.config.thinking_flush_ms {
                            // User kept talking; flush as a second utterance
                            self.emit_utterance(&mut inner);
                            inner.thinking_voiced_ms = 0;
                        }
                    }
                    VadState::SpeechEnd => {
                        self.emit_utterance(&mut inner);
                        inner.thinking_voiced_ms = 0;
                    }
                    VadState::Silence => {}
                }
            }

            BridgeState::Speaking => {
                if matches!(vad_state, VadState::Speech | VadState::SpeechStart) {
                    inner.barge_in_voiced_ms += frame_ms;
                    self.buffer_frame(&mut inner, frame);

                    if inner.barge_in_voiced_ms >= self.config.barge_in_threshold_ms
                        && !inner.critical_prompt
                    {
                        inner.barge_in_voiced_ms = 0;
                        let _ = self.event_tx.send(BridgeEvent::BargeIn);
                        self.set_state(&mut inner, BridgeState::Listening);
                    }
                } else {
                    inner.barge_in_voiced_ms = 0;
                }
            }
        }
    }

    /// Playback is starting; `critical` disables barge-in (consent prompts)
    pub fn begin_speaking(&self, critical: bool) {
        let mut inner = self.inner.lock();
        inner.critical_prompt = critical;
        inner.barge_in_voiced_ms = 0;
        self.set_state(&mut inner, BridgeState::Speaking);
    }

    /// Playback finished. If user audio arrived meanwhile, the user wins
    /// and the bridge listens; otherwise it returns to idle.
    pub fn speaking_done(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BridgeState::Speaking {
            return;
        }
        inner.critical_prompt = false;
        if inner.vad.is_in_speech() || !inner.utterance.is_empty() {
            self.set_state(&mut inner, BridgeState::Listening);
        } else {
            self.set_state(&mut inner, BridgeState::Idle);
        }
    }

    /// Hand the assistant turn over without speaking (chat channels)
    pub fn turn_done(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BridgeState::Thinking {
            self.set_state(&mut inner, BridgeState::Idle);
        }
    }

    fn buffer_frame(&self, inner: &mut BridgeInner, frame: &AudioFrame) {
        let cap_samples =
            (self.config.buffer_cap_ms * inner.sample_rate_hz as u64 / 1000) as usize;
        inner.utterance.extend_from_slice(&frame.samples);

        if inner.utterance.len() > cap_samples {
            let excess = inner.utterance.len() - cap_samples;
            inner.utterance.drain(..excess);
            if !inner.degraded_reported {
                inner.degraded_reported = true;
                let _ = self.event_tx.send(BridgeEvent::Degraded);
                tracing::warn!("Audio buffer cap reached, dropping oldest samples");
            }
        }
    }

    fn emit_utterance(&self, inner: &mut BridgeInner) {
        if inner.utterance.is_empty() {
            return;
        }
        let samples = std::mem::take(&mut inner.utterance);
        let duration_ms = samples.len() as u64 * 1000 / inner.sample_rate_hz as u64;
        inner.degraded_reported = false;
        let _ = self.event_tx.send(BridgeEvent::UtteranceReady {
            samples,
            duration_ms,
        });
    }

    fn set_state(&self, inner: &mut BridgeInner, state: BridgeState) {
        if inner.state != state {
            tracing::trace!(from = ?inner.state, to = ?state, "Bridge state change");
            inner.state = state;
            let _ = self.event_tx.send(BridgeEvent::StateChanged(state));
        }
    }
}
