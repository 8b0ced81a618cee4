//! Session supervision
//!
//! Owns the lifecycle of every live session: capacity enforcement, idle
//! sweep, summary persistence on close.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use call_agent_agent::{
    Channel, ConversationEngine, EngineConfig, IndustryProfile, ProfileKey, SessionEnd,
};
use call_agent_config::Settings;
use call_agent_jobs::JobService;
use call_agent_pipeline::{AudioBridge, BridgeConfig, InferencePool, LanguageModel, VadConfig};
use call_agent_storage::Storage;
use call_agent_triage::{RuleTable, TriageEngine};
use call_agent_core::TenantId;

use crate::ServerError;

/// One live session
pub struct SessionHandle {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub channel: Channel,
    pub engine: Arc<ConversationEngine>,
    pub bridge: Arc<AudioBridge>,
    pub created_at: Instant,
    last_activity: RwLock<Instant>,
    active: RwLock<bool>,
}

impl SessionHandle {
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    fn close(&self) {
        *self.active.write() = false;
    }
}

/// Process-wide session registry and lifecycle owner
pub struct SessionSupervisor {
    settings: Arc<Settings>,
    storage: Storage,
    jobs: Arc<JobService>,
    llm: Arc<dyn LanguageModel>,
    pool: Arc<InferencePool>,
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl SessionSupervisor {
    pub fn new(
        settings: Arc<Settings>,
        storage: Storage,
        jobs: Arc<JobService>,
        llm: Arc<dyn LanguageModel>,
        pool: Arc<InferencePool>,
    ) -> Self {
        Self {
            settings,
            storage,
            jobs,
            llm,
            pool,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a session; rejected with `Overloaded` above the cap or while the
    /// inference pool is saturated.
    pub async fn open(
        &self,
        tenant_id: TenantId,
        channel: Channel,
        profile: ProfileKey,
    ) -> Result<Arc<SessionHandle>, ServerError> {
        if self.sessions.read().len() >= self.settings.session.max_concurrent {
            tracing::warn!(tenant = %tenant_id, "Session rejected: at capacity");
            return Err(ServerError::Overloaded);
        }
        if self.pool.is_saturated() {
            tracing::warn!(tenant = %tenant_id, "Session rejected: inference pool saturated");
            return Err(ServerError::Overloaded);
        }

        let tenant = self
            .storage
            .tenants
            .get(tenant_id)
            .await?
            .ok_or(ServerError::TenantNotFound)?;

        let profile = IndustryProfile::by_key(profile);
        let triage = TriageEngine::new(RuleTable::builtin(self.settings.triage.rules_version))
            .with_preferred_category(None);

        let session_id = Uuid::new_v4();
        let engine = Arc::new(ConversationEngine::new(
            session_id,
            tenant,
            channel,
            profile,
            EngineConfig {
                stt_confidence_floor: self.settings.triage.stt_confidence_floor,
                llm_soft_timeout: Duration::from_millis(self.settings.inference.llm_soft_ms),
                history_turns: 8,
                triage_rules_version: self.settings.triage.rules_version,
            },
            self.llm.clone(),
            triage,
            self.jobs.clone(),
            self.storage.clone(),
        ));

        let bridge = Arc::new(AudioBridge::new(BridgeConfig {
            vad: VadConfig::default(),
            barge_in_threshold_ms: self.settings.barge_in.threshold_ms,
            thinking_flush_ms: 3_000,
            buffer_cap_ms: self.settings.session.audio_buffer_cap_s * 1_000,
        }));

        let handle = Arc::new(SessionHandle {
            id: session_id,
            tenant_id,
            channel,
            engine,
            bridge,
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            active: RwLock::new(true),
        });

        self.sessions.write().insert(session_id, handle.clone());
        tracing::info!(
            session = %session_id,
            tenant = %tenant_id,
            channel = ?channel,
            live = self.sessions.read().len(),
            "Session opened"
        );
        Ok(handle)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Close a session and persist its summary
    pub async fn close(&self, id: Uuid, end: SessionEnd) {
        let Some(handle) = self.sessions.write().remove(&id) else {
            return;
        };
        handle.close();

        let summary = handle.engine.summary(end);
        if let Err(error) = self.storage.summaries.append(summary).await {
            tracing::error!(session = %id, %error, "Failed to persist session summary");
        }

        tracing::info!(session = %id, ?end, "Session closed");
    }

    /// Idle/duration limits for a channel
    fn limits(&self, channel: Channel) -> (Duration, Duration) {
        match channel {
            Channel::Phone => (
                Duration::from_secs(self.settings.session.phone_idle_s),
                Duration::from_secs(self.settings.session.phone_max_s),
            ),
            Channel::Chat => (
                Duration::from_secs(self.settings.session.chat_idle_s),
                Duration::from_secs(self.settings.session.chat_max_s),
            ),
        }
    }

    /// Periodic sweep killing sessions idle beyond twice the idle threshold
    /// (the channel driver handles the in-between reprompt) or over their
    /// hard duration cap.
    pub fn start_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let expired: Vec<(Uuid, SessionEnd)> = {
                    let sessions = self.sessions.read();
                    sessions
                        .values()
                        .filter_map(|s| {
                            let (idle_limit, max_duration) = self.limits(s.channel);
                            if s.created_at.elapsed() > max_duration {
                                Some((s.id, SessionEnd::Completed))
                            } else if s.idle() > idle_limit * 2 {
                                Some((s.id, SessionEnd::Abandoned))
                            } else {
                                None
                            }
                        })
                        .collect()
                };

                for (id, end) in expired {
                    tracing::info!(session = %id, ?end, "Sweeper closing session");
                    self.close(id, end).await;
                }
            }
        });
    }
}
