//! Adapter trait and the simulated provider

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use call_agent_core::AudioFrame;

use crate::events::{CallEvent, HangupCause};
use crate::media::OutboundFrameQueue;
use crate::TelephonyError;

/// Handle to a running playback; canceling stops output within one frame
#[derive(Clone)]
pub struct PlaybackHandle {
    cancelled: Arc<AtomicBool>,
}

impl PlaybackHandle {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop playback; used for barge-in
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform interface over telephony providers
#[async_trait]
pub trait TelephonyAdapter: Send + Sync {
    /// Answer an incoming call. `ProviderUnavailable` is retryable,
    /// `CallGone` is fatal.
    async fn answer(&self, call_id: Uuid) -> Result<(), TelephonyError>;

    /// Hang up. Idempotent: repeated calls after the first success are no-ops.
    async fn hangup(&self, call_id: Uuid, cause: HangupCause) -> Result<(), TelephonyError>;

    /// Transfer to a destination. On `TransferRejected` the call stays active.
    async fn transfer(&self, call_id: Uuid, destination: &str) -> Result<(), TelephonyError>;

    /// Stream synthesized audio to the caller. The returned handle cancels
    /// playback within one frame duration.
    async fn play(
        &self,
        call_id: Uuid,
        audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<PlaybackHandle, TelephonyError>;
}

struct SimulatedCall {
    answered: bool,
    ended: bool,
    events: mpsc::Sender<CallEvent>,
    outbound: Arc<OutboundFrameQueue>,
    transfers: Vec<String>,
}

/// In-process provider for tests and local development.
///
/// Calls are injected with [`SimulatedAdapter::inject_call`]; outbound audio
/// lands in a per-call queue that tests can inspect.
pub struct SimulatedAdapter {
    calls: RwLock<HashMap<Uuid, SimulatedCall>>,
    /// Force the next answer to fail with `ProviderUnavailable`
    pub fail_next_answer: AtomicBool,
    /// Reject all transfers
    pub reject_transfers: AtomicBool,
    audio_seq: Mutex<HashMap<Uuid, u64>>,
}

impl SimulatedAdapter {
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            fail_next_answer: AtomicBool::new(false),
            reject_transfers: AtomicBool::new(false),
            audio_seq: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new inbound call, returning its id and event stream
    pub fn inject_call(&self, from: &str, to: &str) -> (Uuid, mpsc::Receiver<CallEvent>) {
        let call_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(256);

        let incoming = CallEvent::CallIncoming {
            call_id,
            from: from.to_string(),
            to: to.to_string(),
            trunk: "sim0".to_string(),
            timestamp: chrono::Utc::now(),
        };
        // Channel is fresh, the first send cannot fail
        let _ = tx.try_send(incoming);

        self.calls.write().insert(
            call_id,
            SimulatedCall {
                answered: false,
                ended: false,
                events: tx,
                outbound: Arc::new(OutboundFrameQueue::new(512)),
                transfers: Vec::new(),
            },
        );

        (call_id, rx)
    }

    /// Push caller audio into the call's event stream.
    ///
    /// A full channel means the session stopped draining; per the event
    /// contract that is a fatal session fault, so the call is ended.
    pub async fn inject_audio(&self, call_id: Uuid, frame: AudioFrame) -> Result<(), TelephonyError> {
        let tx = {
            let calls = self.calls.read();
            let call = calls.get(&call_id).ok_or(TelephonyError::CallGone(call_id))?;
            call.events.clone()
        };

        let event = CallEvent::Audio { call_id, frame };
        if tx.try_send(event).is_err() {
            tracing::error!(call = %call_id, "Event channel overflow, aborting call");
            self.hangup(call_id, HangupCause::ProviderError).await?;
            return Err(TelephonyError::CallGone(call_id));
        }
        Ok(())
    }

    /// Next sequence number for generated frames
    pub fn next_seq(&self, call_id: Uuid) -> u64 {
        let mut seqs = self.audio_seq.lock();
        let seq = seqs.entry(call_id).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Frames played towards the caller so far
    pub fn played_frames(&self, call_id: Uuid) -> usize {
        self.calls
            .read()
            .get(&call_id)
            .map(|c| c.outbound.len())
            .unwrap_or(0)
    }

    /// Transfer destinations attempted for a call
    pub fn transfers(&self, call_id: Uuid) -> Vec<String> {
        self.calls
            .read()
            .get(&call_id)
            .map(|c| c.transfers.clone())
            .unwrap_or_default()
    }

    pub fn is_ended(&self, call_id: Uuid) -> bool {
        self.calls
            .read()
            .get(&call_id)
            .map(|c| c.ended)
            .unwrap_or(true)
    }
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelephonyAdapter for SimulatedAdapter {
    async fn answer(&self, call_id: Uuid) -> Result<(), TelephonyError> {
        if self.fail_next_answer.swap(false, Ordering::SeqCst) {
            return Err(TelephonyError::ProviderUnavailable(
                "simulated outage".to_string(),
            ));
        }

        let mut calls = self.calls.write();
        let call = calls
            .get_mut(&call_id)
            .ok_or(TelephonyError::CallGone(call_id))?;
        if call.ended {
            return Err(TelephonyError::CallGone(call_id));
        }
        call.answered = true;

        let _ = call.events.try_send(CallEvent::CallAnswered { call_id });
        tracing::debug!(call = %call_id, "Call answered");
        Ok(())
    }

    async fn hangup(&self, call_id: Uuid, cause: HangupCause) -> Result<(), TelephonyError> {
        let mut calls = self.calls.write();
        let Some(call) = calls.get_mut(&call_id) else {
            // Unknown call: treat like an already-completed hangup
            return Ok(());
        };
        if call.ended {
            return Ok(());
        }
        call.ended = true;
        let _ = call.events.try_send(CallEvent::CallEnded { call_id, cause });
        tracing::debug!(call = %call_id, ?cause, "Call ended");
        Ok(())
    }

    async fn transfer(&self, call_id: Uuid, destination: &str) -> Result<(), TelephonyError> {
        if self.reject_transfers.load(Ordering::SeqCst) {
            return Err(TelephonyError::TransferRejected(destination.to_string()));
        }

        let mut calls = self.calls.write();
        let call = calls
            .get_mut(&call_id)
            .ok_or(TelephonyError::CallGone(call_id))?;
        if call.ended {
            return Err(TelephonyError::CallGone(call_id));
        }
        call.transfers.push(destination.to_string());
        tracing::info!(call = %call_id, destination, "Call transferred");
        Ok(())
    }

    async fn play(
        &self,
        call_id: Uuid,
        mut audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<PlaybackHandle, TelephonyError> {
        let outbound = {
            let calls = self.calls.read();
            let call = calls.get(&call_id).ok_or(TelephonyError::CallGone(call_id))?;
            if call.ended {
                return Err(TelephonyError::CallGone(call_id));
            }
            call.outbound.clone()
        };

        let handle = PlaybackHandle::new();
        let playback = handle.clone();

        tokio::spawn(async move {
            while let Some(frame) = audio.recv().await {
                if playback.is_cancelled() {
                    break;
                }
                outbound.push(frame);
            }
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::SampleRate;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![0i16; 320], SampleRate::Hz16000, seq, seq * 20)
    }

    #[tokio::test]
    async fn test_answer_and_events() {
        let adapter = SimulatedAdapter::new();
        let (call_id, mut rx) = adapter.inject_call("+4930123456", "+4930999999");

        assert!(matches!(
            rx.recv().await.unwrap(),
            CallEvent::CallIncoming { .. }
        ));

        adapter.answer(call_id).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            CallEvent::CallAnswered { .. }
        ));
    }

    #[tokio::test]
    async fn test_answer_retryable_failure() {
        let adapter = SimulatedAdapter::new();
        let (call_id, _rx) = adapter.inject_call("+491", "+492");

        adapter.fail_next_answer.store(true, Ordering::SeqCst);
        assert!(matches!(
            adapter.answer(call_id).await,
            Err(TelephonyError::ProviderUnavailable(_))
        ));
        // Second attempt succeeds
        adapter.answer(call_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_hangup_idempotent() {
        let adapter = SimulatedAdapter::new();
        let (call_id, _rx) = adapter.inject_call("+491", "+492");

        adapter.answer(call_id).await.unwrap();
        adapter.hangup(call_id, HangupCause::AgentHangup).await.unwrap();
        adapter.hangup(call_id, HangupCause::AgentHangup).await.unwrap();
        adapter.hangup(call_id, HangupCause::CallerHangup).await.unwrap();

        assert!(adapter.is_ended(call_id));
    }

    #[tokio::test]
    async fn test_transfer_rejected_keeps_call() {
        let adapter = SimulatedAdapter::new();
        let (call_id, _rx) = adapter.inject_call("+491", "+492");
        adapter.answer(call_id).await.unwrap();

        adapter.reject_transfers.store(true, Ordering::SeqCst);
        assert!(matches!(
            adapter.transfer(call_id, "112").await,
            Err(TelephonyError::TransferRejected(_))
        ));
        assert!(!adapter.is_ended(call_id));
    }

    #[tokio::test]
    async fn test_play_and_cancel() {
        let adapter = SimulatedAdapter::new();
        let (call_id, _rx) = adapter.inject_call("+491", "+492");
        adapter.answer(call_id).await.unwrap();

        let (tx, rx) = mpsc::channel(16);
        let handle = adapter.play(call_id, rx).await.unwrap();

        tx.send(frame(1)).await.unwrap();
        tx.send(frame(2)).await.unwrap();
        tokio::task::yield_now().await;

        handle.cancel();
        tx.send(frame(3)).await.unwrap();
        drop(tx);
        tokio::task::yield_now().await;

        assert!(adapter.played_frames(call_id) <= 2);
    }
}
