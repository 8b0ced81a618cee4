//! Application state
//!
//! Explicitly constructed service graph; no global singletons. Tests build a
//! fresh `AppState` per case.

use std::sync::Arc;

use call_agent_compliance::{
    AuditLedger, ConsentManager, ErasureService, RetentionPolicy, RetentionSweeper,
};
use call_agent_config::Settings;
use call_agent_dispatch::{EscalationTimers, RoutingEngine};
use call_agent_jobs::{JobService, NotificationChannel, SimulatedEmailChannel, SimulatedSmsChannel};
use call_agent_pipeline::{
    InferencePool, LanguageModel, ScriptedLlm, ScriptedStt, ScriptedTts, SpeechToText,
    TextToSpeech,
};
use call_agent_scheduling::SchedulingEngine;
use call_agent_storage::Storage;
use call_agent_telephony::{SimulatedAdapter, TelephonyAdapter};

use crate::session::SessionSupervisor;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub storage: Storage,
    pub ledger: Arc<AuditLedger>,
    pub consents: Arc<ConsentManager>,
    pub erasure: Arc<ErasureService>,
    pub routing: Arc<RoutingEngine>,
    pub scheduling: Arc<SchedulingEngine>,
    pub jobs: Arc<JobService>,
    pub sessions: Arc<SessionSupervisor>,
    pub pool: Arc<InferencePool>,
    pub stt: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn TextToSpeech>,
    pub telephony: Arc<SimulatedAdapter>,
}

impl AppState {
    /// Wire the full service graph with in-memory storage and the simulated
    /// external collaborators.
    pub fn new(settings: Settings) -> Self {
        Self::with_ai(
            settings,
            Arc::new(ScriptedStt::new()),
            Arc::new(ScriptedLlm::new()),
            None,
        )
    }

    /// Same graph with caller-supplied AI stages (tests script them)
    pub fn with_ai(
        settings: Settings,
        stt: Arc<dyn SpeechToText>,
        llm: Arc<dyn LanguageModel>,
        tts: Option<Arc<dyn TextToSpeech>>,
    ) -> Self {
        let settings = Arc::new(settings);
        let storage = Storage::in_memory();

        let ledger = Arc::new(AuditLedger::new(storage.audit.clone()));
        let consents = Arc::new(ConsentManager::new(storage.consents.clone(), ledger.clone()));
        let erasure = Arc::new(ErasureService::new(
            storage.contacts.clone(),
            storage.jobs.clone(),
            storage.consents.clone(),
            storage.summaries.clone(),
            ledger.clone(),
        ));

        let routing = Arc::new(RoutingEngine::new(
            storage.rules.clone(),
            storage.workforce.clone(),
        ));
        let scheduling = Arc::new(SchedulingEngine::new(storage.calendar.clone()));

        let notifications: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(SimulatedSmsChannel::new()),
            Arc::new(SimulatedEmailChannel::new()),
        ];
        let (escalations, escalation_rx) = EscalationTimers::new(64);

        let jobs = Arc::new(JobService::new(
            storage.clone(),
            routing.clone(),
            scheduling.clone(),
            ledger.clone(),
            notifications,
            escalations,
        ));
        tokio::spawn(jobs.clone().run_escalations(escalation_rx));

        let pool = InferencePool::new(4, settings.inference.pool_high_water);
        let tts: Arc<dyn TextToSpeech> =
            tts.unwrap_or_else(|| Arc::new(ScriptedTts::new(settings.audio.frame_ms)));
        let telephony = Arc::new(SimulatedAdapter::new());

        let sessions = Arc::new(SessionSupervisor::new(
            settings.clone(),
            storage.clone(),
            jobs.clone(),
            llm.clone(),
            pool.clone(),
        ));
        sessions.clone().start_sweeper();

        // Daily retention sweep across all active tenants
        let sweeper = RetentionSweeper::new(
            storage.contacts.clone(),
            storage.summaries.clone(),
            ledger.clone(),
            RetentionPolicy {
                contact_days: settings.storage.contact_retention_days,
                session_days: settings.storage.session_retention_days,
            },
        );
        let sweep_storage = storage.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let tenants = match sweep_storage.tenants.list_active().await {
                    Ok(tenants) => tenants,
                    Err(error) => {
                        tracing::error!(%error, "Retention sweep could not list tenants");
                        continue;
                    }
                };
                for tenant in tenants {
                    if let Err(error) = sweeper.sweep(tenant.id).await {
                        tracing::error!(tenant = %tenant.id, %error, "Retention sweep failed");
                    }
                }
            }
        });

        Self {
            settings,
            storage,
            ledger,
            consents,
            erasure,
            routing,
            scheduling,
            jobs,
            sessions,
            pool,
            stt,
            llm,
            tts,
            telephony,
        }
    }

    /// `TelephonyAdapter` view of the simulated provider
    pub fn telephony_adapter(&self) -> Arc<dyn TelephonyAdapter> {
        self.telephony.clone()
    }
}
