//! Phone session driver
//!
//! One task per call, serially processing call events: caller audio runs
//! through the bridge and VAD; finished utterances go to STT on the
//! inference pool; the conversation engine produces the reply; TTS frames
//! stream back through the adapter. Barge-in cancels playback within a
//! frame.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use call_agent_agent::{AgentResponse, Channel, ProfileKey, SessionEnd};
use call_agent_core::{SampleRate, TenantId};
use call_agent_pipeline::{retry_with_backoff, BridgeEvent, RetryPolicy, SttRequest, WorkPriority};
use call_agent_telephony::{CallEvent, HangupCause, PlaybackHandle, TelephonyAdapter};

use crate::session::SessionHandle;
use crate::state::AppState;
use crate::ServerError;

/// Run one phone call to completion
pub async fn run_phone_session(
    state: AppState,
    tenant: TenantId,
    profile: ProfileKey,
    call_id: Uuid,
    mut events: mpsc::Receiver<CallEvent>,
) {
    let adapter = state.telephony_adapter();

    // Answer with backoff; ProviderUnavailable is retryable, CallGone fatal
    let answer = retry_with_backoff(
        &RetryPolicy::default(),
        || {
            let adapter = adapter.clone();
            async move { adapter.answer(call_id).await }
        },
        |error| matches!(error, call_agent_telephony::TelephonyError::ProviderUnavailable(_)),
    )
    .await;
    if let Err(error) = answer {
        tracing::warn!(call = %call_id, %error, "Answer failed, dropping call");
        return;
    }

    let session = match state.sessions.open(tenant, Channel::Phone, profile).await {
        Ok(session) => session,
        Err(ServerError::Overloaded) => {
            // Busy signal: immediate hangup
            let _ = adapter.hangup(call_id, HangupCause::Busy).await;
            return;
        }
        Err(error) => {
            tracing::warn!(call = %call_id, %error, "Session open failed");
            let _ = adapter.hangup(call_id, HangupCause::ProviderError).await;
            return;
        }
    };

    let mut driver = PhoneDriver {
        state: state.clone(),
        adapter,
        session: session.clone(),
        call_id,
        playback: None,
        end: SessionEnd::HungUp,
    };

    driver.speak(session.engine.start()).await;

    let idle = Duration::from_secs(state.settings.session.phone_idle_s);
    let mut bridge_rx = session.bridge.subscribe();

    loop {
        tokio::select! {
            event = tokio::time::timeout(idle, events.recv()) => {
                match event {
                    Err(_) => {
                        // Idle: one reprompt, then the session ends
                        let response = session.engine.handle_idle_timeout();
                        let ends = response.end_session;
                        driver.speak(response).await;
                        if ends {
                            driver.end = SessionEnd::Abandoned;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Ok(Some(CallEvent::Audio { frame, .. })) => {
                        session.touch();
                        session.bridge.process_frame(&frame);
                    }
                    Ok(Some(CallEvent::CallEnded { .. })) => {
                        driver.end = SessionEnd::HungUp;
                        break;
                    }
                    Ok(Some(_)) => {}
                }
            }

            bridge_event = bridge_rx.recv() => {
                match bridge_event {
                    Ok(BridgeEvent::UtteranceReady { samples, .. }) => {
                        if driver.handle_utterance(samples).await {
                            break;
                        }
                    }
                    Ok(BridgeEvent::BargeIn) => {
                        if let Some(playback) = driver.playback.take() {
                            playback.cancel();
                            tracing::debug!(call = %call_id, "Barge-in, playback cancelled");
                        }
                    }
                    Ok(BridgeEvent::Degraded) => {
                        tracing::warn!(call = %call_id, "Audio path degraded");
                    }
                    Ok(BridgeEvent::StateChanged(_)) => {}
                    Err(_) => break,
                }
            }
        }
    }

    let _ = driver
        .adapter
        .hangup(call_id, HangupCause::AgentHangup)
        .await;
    state.sessions.close(session.id, driver.end).await;
}

struct PhoneDriver {
    state: AppState,
    adapter: Arc<dyn TelephonyAdapter>,
    session: Arc<SessionHandle>,
    call_id: Uuid,
    playback: Option<PlaybackHandle>,
    end: SessionEnd,
}

impl PhoneDriver {
    /// STT -> engine -> TTS for one finished utterance.
    /// Returns true when the session should end.
    async fn handle_utterance(&mut self, samples: Vec<i16>) -> bool {
        let stt = self.state.stt.clone();
        let request = SttRequest::new(samples, SampleRate::Hz16000).with_language("de");
        let stt_timeout = Duration::from_millis(self.state.settings.inference.stt_ms);

        let priority = if self.session.engine.is_escalated() {
            WorkPriority::Emergency
        } else {
            WorkPriority::ScheduledCall
        };

        let (result_rx, _cancel) = self
            .state
            .pool
            .submit(priority, async move { stt.transcribe(request).await });

        let transcript = match tokio::time::timeout(stt_timeout, result_rx).await {
            Ok(Ok(Ok(transcript))) => transcript,
            Ok(Ok(Err(error))) => {
                tracing::warn!(call = %self.call_id, %error, "STT failed, reprompting");
                self.speak_text("Entschuldigung, könnten Sie das bitte wiederholen?", false)
                    .await;
                return false;
            }
            _ => {
                tracing::warn!(call = %self.call_id, "STT timed out, reprompting");
                self.speak_text("Entschuldigung, könnten Sie das bitte wiederholen?", false)
                    .await;
                return false;
            }
        };

        let response = match self.session.engine.handle_transcript(&transcript).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(call = %self.call_id, %error, "Turn failed");
                self.end = SessionEnd::Error;
                return true;
            }
        };

        let ends = response.end_session;
        let transfer = response.transfer_to.clone();
        let escalated = response.escalated;
        self.speak(response).await;

        if let Some(destination) = transfer {
            match self.adapter.transfer(self.call_id, &destination).await {
                Ok(()) => {
                    self.end = SessionEnd::Escalated;
                    return true;
                }
                Err(error) => {
                    // Surfaced error: the call stays active
                    tracing::warn!(call = %self.call_id, %error, "Transfer failed");
                }
            }
        }

        if ends {
            self.end = if escalated {
                SessionEnd::Escalated
            } else {
                SessionEnd::Completed
            };
            return true;
        }
        false
    }

    async fn speak(&mut self, response: AgentResponse) {
        let critical = response.critical;
        self.speak_text(&response.text, critical).await;
    }

    /// Synthesize and stream; completion flips the bridge out of SPEAKING
    async fn speak_text(&mut self, text: &str, critical: bool) {
        let mut tts_rx = match self.state.tts.synthesize(text).await {
            Ok(rx) => rx,
            Err(error) => {
                tracing::warn!(call = %self.call_id, %error, "TTS failed, skipping utterance");
                return;
            }
        };

        let (out_tx, out_rx) = mpsc::channel(64);
        let handle = match self.adapter.play(self.call_id, out_rx).await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(call = %self.call_id, %error, "Playback failed");
                return;
            }
        };

        self.session.bridge.begin_speaking(critical);
        self.playback = Some(handle.clone());

        let bridge = self.session.bridge.clone();
        let first_frame_budget =
            Duration::from_millis(self.state.settings.inference.tts_first_frame_ms);
        let call_id = self.call_id;
        tokio::spawn(async move {
            // Time-to-first-frame budget; a stalled synthesizer must not
            // leave the caller in silence
            match tokio::time::timeout(first_frame_budget, tts_rx.recv()).await {
                Ok(Some(frame)) => {
                    let _ = out_tx.send(frame).await;
                }
                Ok(None) => {
                    bridge.speaking_done();
                    return;
                }
                Err(_) => {
                    tracing::warn!(call = %call_id, "TTS first frame exceeded budget");
                    handle.cancel();
                    bridge.speaking_done();
                    return;
                }
            }

            while let Some(frame) = tts_rx.recv().await {
                if handle.is_cancelled() {
                    break;
                }
                if out_tx.send(frame).await.is_err() {
                    break;
                }
            }
            bridge.speaking_done();
        });
    }
}
