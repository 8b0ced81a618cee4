//! Per-session conversation state machine
//!
//! Skeleton shared by all industry profiles:
//!
//! ```text
//! GREETING -> INTAKE -> CLASSIFICATION -> SLOT_FILL -> CONFIRMATION
//!     -> ACTION -> FAREWELL
//! ```
//!
//! ESCALATION is reachable from every state. Each turn is processed against
//! an immutable snapshot of the transcript plus the mutable slot store owned
//! by the session.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use call_agent_core::{
    Contact, Job, JobDraft, JobSource, MessageWindow, Tenant, TranscriptResult, Turn, Urgency,
};
use call_agent_core::job::PreferredWindow;
use call_agent_jobs::JobService;
use call_agent_pipeline::{GenerationRequest, LanguageModel};
use call_agent_storage::{SessionOutcome, SessionSummary, Storage};
use call_agent_triage::{CallerContext, TriageEngine, TriageOutcome};

use crate::intent::{Intent, IntentDetector};
use crate::profile::IndustryProfile;
use crate::slots::{SlotKey, SlotStore};
use crate::AgentError;

/// Transport the session runs on; drives timeouts and phrasing limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Phone,
    Chat,
}

impl Channel {
    pub fn job_source(&self) -> JobSource {
        match self {
            Channel::Phone => JobSource::Phone,
            Channel::Chat => JobSource::Chat,
        }
    }
}

/// Conversation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Greeting,
    Intake,
    Classification,
    SlotFill,
    Confirmation,
    Action,
    Farewell,
    Escalation,
}

/// One assistant turn produced by the engine
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
    pub state: ConversationState,
    /// Critical prompts disable barge-in
    pub critical: bool,
    pub end_session: bool,
    pub escalated: bool,
    /// Transfer destination the telephony adapter should dial
    pub transfer_to: Option<String>,
    /// Job created this turn, if any
    pub job: Option<Job>,
}

impl AgentResponse {
    fn say(text: impl Into<String>, state: ConversationState) -> Self {
        Self {
            text: text.into(),
            state,
            critical: false,
            end_session: false,
            escalated: false,
            transfer_to: None,
            job: None,
        }
    }
}

/// Why and how the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Completed,
    Abandoned,
    Escalated,
    HungUp,
    Error,
}

impl SessionEnd {
    fn outcome(self) -> SessionOutcome {
        match self {
            SessionEnd::Completed => SessionOutcome::Completed,
            SessionEnd::Abandoned => SessionOutcome::Abandoned,
            SessionEnd::Escalated => SessionOutcome::Escalated,
            SessionEnd::HungUp => SessionOutcome::Completed,
            SessionEnd::Error => SessionOutcome::Error,
        }
    }
}

/// Engine tunables from configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stt_confidence_floor: f32,
    pub llm_soft_timeout: Duration,
    pub history_turns: usize,
    pub triage_rules_version: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stt_confidence_floor: 0.5,
            llm_soft_timeout: Duration::from_millis(2_000),
            history_turns: 8,
            triage_rules_version: 1,
        }
    }
}

/// Conversation engine for one session
pub struct ConversationEngine {
    session_id: Uuid,
    tenant: Tenant,
    channel: Channel,
    profile: IndustryProfile,
    config: EngineConfig,
    llm: Arc<dyn LanguageModel>,
    triage: TriageEngine,
    jobs: Arc<JobService>,
    storage: Storage,

    state: Mutex<ConversationState>,
    slots: Mutex<SlotStore>,
    history: Mutex<MessageWindow>,
    intent_detector: IntentDetector,
    triage_outcome: Mutex<Option<TriageOutcome>>,
    created_job: Mutex<Option<Job>>,
    expected_slot: Mutex<Option<SlotKey>>,
    escalated: AtomicBool,
    idle_reprompted: AtomicBool,
    ended: AtomicBool,
    turn_count: AtomicU32,
    started: Instant,
}

impl ConversationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: Uuid,
        tenant: Tenant,
        channel: Channel,
        profile: IndustryProfile,
        config: EngineConfig,
        llm: Arc<dyn LanguageModel>,
        triage: TriageEngine,
        jobs: Arc<JobService>,
        storage: Storage,
    ) -> Self {
        let intent_detector = IntentDetector::new(profile.emergency_phrases.clone());
        let history_turns = config.history_turns.max(2);
        Self {
            session_id,
            tenant,
            channel,
            profile,
            config,
            llm,
            triage,
            jobs,
            storage,
            state: Mutex::new(ConversationState::Greeting),
            slots: Mutex::new(SlotStore::new()),
            history: Mutex::new(MessageWindow::new(history_turns)),
            intent_detector,
            triage_outcome: Mutex::new(None),
            created_job: Mutex::new(None),
            expected_slot: Mutex::new(None),
            escalated: AtomicBool::new(false),
            idle_reprompted: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            turn_count: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> ConversationState {
        *self.state.lock()
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count.load(Ordering::SeqCst)
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated.load(Ordering::SeqCst)
    }

    pub fn created_job(&self) -> Option<Job> {
        self.created_job.lock().clone()
    }

    /// Opening utterance at session start
    pub fn start(&self) -> AgentResponse {
        let greeting = self.profile.greeting;
        self.push_assistant(greeting);
        AgentResponse::say(greeting, ConversationState::Greeting)
    }

    /// Handle one STT result. Low-confidence transcripts are reprompted
    /// without advancing the state or touching the language model.
    pub async fn handle_transcript(
        &self,
        transcript: &TranscriptResult,
    ) -> Result<AgentResponse, AgentError> {
        if transcript.confidence < self.config.stt_confidence_floor {
            tracing::info!(
                session = %self.session_id,
                confidence = transcript.confidence,
                "STT low confidence, reprompting"
            );
            return Ok(AgentResponse::say(self.profile.reprompt, self.state()));
        }
        self.handle_user_text(&transcript.text).await
    }

    /// Handle one user utterance (transcribed speech or chat text)
    pub async fn handle_user_text(&self, text: &str) -> Result<AgentResponse, AgentError> {
        if self.ended.load(Ordering::SeqCst) {
            return Err(AgentError::SessionEnded);
        }

        self.turn_count.fetch_add(1, Ordering::SeqCst);
        self.idle_reprompted.store(false, Ordering::SeqCst);
        self.history.lock().push(Turn::user(text));

        let detected = self.intent_detector.detect(text);
        tracing::debug!(
            session = %self.session_id,
            intent = ?detected.intent,
            state = ?self.state(),
            "User turn"
        );

        let state = self.state();
        let response = if detected.intent == Intent::Emergency {
            self.escalate(text).await?
        } else {
            match state {
                ConversationState::Greeting | ConversationState::Intake => {
                    self.handle_intake(text, detected.intent).await?
                }
                ConversationState::Classification | ConversationState::SlotFill => {
                    self.handle_slot_fill(text).await?
                }
                ConversationState::Confirmation => {
                    self.handle_confirmation(text, detected.intent).await?
                }
                ConversationState::Escalation => {
                    // Keep the caller on the safety guidance until transfer
                    let mut response = AgentResponse::say(
                        self.profile.emergency_response,
                        ConversationState::Escalation,
                    );
                    response.critical = true;
                    response.escalated = true;
                    response
                }
                ConversationState::Action | ConversationState::Farewell => {
                    let mut response =
                        AgentResponse::say(self.profile.farewell, ConversationState::Farewell);
                    response.end_session = true;
                    response
                }
            }
        };

        self.push_assistant(&response.text);
        if response.end_session {
            self.ended.store(true, Ordering::SeqCst);
        }
        Ok(response)
    }

    /// GREETING/INTAKE: capture the problem, branch on intent
    async fn handle_intake(
        &self,
        text: &str,
        intent: Intent,
    ) -> Result<AgentResponse, AgentError> {
        match intent {
            Intent::Farewell => {
                let mut response =
                    AgentResponse::say(self.profile.farewell, ConversationState::Farewell);
                response.end_session = true;
                return Ok(response);
            }
            Intent::SpeakToStaff => {
                let mut response = AgentResponse::say(
                    "Einen Moment bitte, ich verbinde Sie mit einem Mitarbeiter.",
                    ConversationState::Escalation,
                );
                response.transfer_to = self.tenant.emergency_number.clone();
                self.set_state(ConversationState::Escalation);
                return Ok(response);
            }
            Intent::Chitchat | Intent::Query => {
                // Smalltalk or an open question: LLM path. An Unknown intent
                // falls through instead and is taken as the problem statement.
                if !self.slots.lock().is_filled(SlotKey::Problem) {
                    let text = self.generate_open_response(text).await;
                    self.set_state(ConversationState::Intake);
                    *self.expected_slot.lock() = Some(SlotKey::Problem);
                    return Ok(AgentResponse::say(text, ConversationState::Intake));
                }
            }
            _ => {}
        }

        {
            let mut slots = self.slots.lock();
            slots.ingest(text, Some(SlotKey::Problem));
        }

        if self.slots.lock().is_filled(SlotKey::Problem) {
            // CLASSIFICATION: pure triage over the stated problem
            self.set_state(ConversationState::Classification);
            let problem = self
                .slots
                .lock()
                .get(SlotKey::Problem)
                .unwrap_or_default()
                .to_string();
            let outcome = self.triage.assess(&problem, &self.caller_context());
            tracing::info!(
                session = %self.session_id,
                urgency = outcome.urgency.as_str(),
                category = outcome.category.as_str(),
                score = outcome.score,
                "Triage completed"
            );
            *self.triage_outcome.lock() = Some(outcome.clone());

            if outcome.requires_emergency_dispatch {
                return self.escalate(&problem).await;
            }

            self.set_state(ConversationState::SlotFill);
            let next = self.ask_next_slot();
            return Ok(AgentResponse::say(
                format!("{} {}", outcome.recommended_action, next),
                ConversationState::SlotFill,
            ));
        }

        self.set_state(ConversationState::Intake);
        *self.expected_slot.lock() = Some(SlotKey::Problem);
        Ok(AgentResponse::say(
            self.profile.slot_question(SlotKey::Problem),
            ConversationState::Intake,
        ))
    }

    /// SLOT_FILL: extract fields until the schema is complete
    async fn handle_slot_fill(&self, text: &str) -> Result<AgentResponse, AgentError> {
        let expected = *self.expected_slot.lock();
        {
            let mut slots = self.slots.lock();
            slots.ingest(text, expected);
        }

        if self.slots.lock().all_filled() {
            self.set_state(ConversationState::Confirmation);
            let summary = self.slots.lock().summary();
            return Ok(AgentResponse::say(
                format!(
                    "Ich fasse zusammen: {}. Ist das so richtig?",
                    summary
                ),
                ConversationState::Confirmation,
            ));
        }

        Ok(AgentResponse::say(
            self.ask_next_slot(),
            ConversationState::SlotFill,
        ))
    }

    /// CONFIRMATION: on yes, create the job (ACTION) and close
    async fn handle_confirmation(
        &self,
        _text: &str,
        intent: Intent,
    ) -> Result<AgentResponse, AgentError> {
        match intent {
            Intent::Affirmative => {
                self.set_state(ConversationState::Action);
                let job = self.create_job(false).await?;

                let scheduled = job
                    .scheduled_at
                    .map(|at| {
                        format!(
                            " Ihr Termin: {}.",
                            at.format("%d.%m.%Y um %H:%M Uhr")
                        )
                    })
                    .unwrap_or_default();

                let mut response = AgentResponse::say(
                    format!(
                        "Vielen Dank! Ihr Auftrag {} ist angelegt.{} {}",
                        job.job_number, scheduled, self.profile.farewell
                    ),
                    ConversationState::Farewell,
                );
                response.end_session = true;
                response.job = Some(job);
                self.set_state(ConversationState::Farewell);
                Ok(response)
            }
            Intent::Negative => {
                self.set_state(ConversationState::SlotFill);
                *self.expected_slot.lock() = None;
                Ok(AgentResponse::say(
                    "Entschuldigung. Welche Angabe möchten Sie korrigieren?",
                    ConversationState::SlotFill,
                ))
            }
            _ => Ok(AgentResponse::say(
                format!(
                    "Ich fasse zusammen: {}. Darf ich den Auftrag so anlegen?",
                    self.slots.lock().summary()
                ),
                ConversationState::Confirmation,
            )),
        }
    }

    /// ESCALATION: critical utterance, emergency job, transfer attempt
    async fn escalate(&self, problem_text: &str) -> Result<AgentResponse, AgentError> {
        self.escalated.store(true, Ordering::SeqCst);
        self.set_state(ConversationState::Escalation);

        if !self.slots.lock().is_filled(SlotKey::Problem) {
            self.slots
                .lock()
                .ingest(problem_text, Some(SlotKey::Problem));
        }

        let outcome = self.triage.assess(problem_text, &self.caller_context());
        let mut text = self.profile.emergency_response.to_string();
        for instruction in &outcome.safety_instructions {
            text.push(' ');
            text.push_str(instruction);
        }
        *self.triage_outcome.lock() = Some(outcome);

        // Materialize the emergency job right away with whatever we have
        let job = match self.create_job(true).await {
            Ok(job) => Some(job),
            Err(error) => {
                tracing::error!(session = %self.session_id, %error, "Emergency job creation failed");
                None
            }
        };

        tracing::warn!(
            session = %self.session_id,
            tenant = %self.tenant.id,
            "Emergency escalation"
        );

        let mut response = AgentResponse::say(text, ConversationState::Escalation);
        response.critical = true;
        response.escalated = true;
        response.transfer_to = self.tenant.emergency_number.clone();
        response.job = job;
        Ok(response)
    }

    /// Idle timeout handling: one reprompt, then the session is abandoned
    pub fn handle_idle_timeout(&self) -> AgentResponse {
        if !self.idle_reprompted.swap(true, Ordering::SeqCst) {
            let text = "Sind Sie noch da?";
            self.push_assistant(text);
            return AgentResponse::say(text, self.state());
        }

        self.ended.store(true, Ordering::SeqCst);
        let mut response = AgentResponse::say(self.profile.farewell, ConversationState::Farewell);
        response.end_session = true;
        response
    }

    /// Summary persisted at session end
    pub fn summary(&self, end: SessionEnd) -> SessionSummary {
        let job = self.created_job.lock().clone();
        SessionSummary {
            id: Uuid::new_v4(),
            tenant_id: self.tenant.id,
            session_id: self.session_id,
            contact_id: job.as_ref().and_then(|j| j.contact_id),
            channel: match self.channel {
                Channel::Phone => "phone".to_string(),
                Channel::Chat => "chat".to_string(),
            },
            outcome: if self.is_escalated() {
                SessionOutcome::Escalated
            } else {
                end.outcome()
            },
            job_id: job.map(|j| j.id),
            turn_count: self.turn_count(),
            duration_s: self.started.elapsed().as_secs(),
            escalated: self.is_escalated(),
            transcript: self.history.lock().as_transcript(),
            created_at: Utc::now(),
        }
    }

    fn ask_next_slot(&self) -> String {
        let next = self.slots.lock().next_missing();
        match next {
            Some(slot) => {
                *self.expected_slot.lock() = Some(slot);
                self.profile.slot_question(slot).to_string()
            }
            None => String::new(),
        }
    }

    /// Open-path response through the LLM, template fallback on timeout
    async fn generate_open_response(&self, text: &str) -> String {
        let request = GenerationRequest {
            system_prompt: self.profile.system_prompt.to_string(),
            history: self
                .history
                .lock()
                .turns()
                .iter()
                .rev()
                .take(self.config.history_turns)
                .rev()
                .cloned()
                .collect(),
            user_message: text.to_string(),
            max_tokens: 128,
            temperature: 0.4,
        };

        match tokio::time::timeout(self.config.llm_soft_timeout, self.llm.generate(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                tracing::warn!(session = %self.session_id, %error, "LLM failed, using template");
                self.profile.llm_fallback.to_string()
            }
            Err(_) => {
                tracing::warn!(session = %self.session_id, "llm_timeout, using template");
                self.profile.llm_fallback.to_string()
            }
        }
    }

    fn caller_context(&self) -> CallerContext {
        let now = Utc::now();
        CallerContext {
            out_of_hours: !self
                .tenant
                .business_hours
                .is_open(chrono::Datelike::weekday(&now.date_naive()), now.time()),
            ..Default::default()
        }
    }

    /// ACTION: upsert the contact and create the job
    async fn create_job(&self, emergency: bool) -> Result<Job, AgentError> {
        let slots = {
            let slots = self.slots.lock();
            (
                slots.get(SlotKey::Problem).map(str::to_string),
                slots.get(SlotKey::Name).map(str::to_string),
                slots.get(SlotKey::Phone).map(str::to_string),
                slots.address().cloned(),
                slots.preferred_time().cloned(),
            )
        };
        let (problem, name, phone, address, preferred) = slots;

        // Contact: reuse by phone or create provisional
        let contact_id = if let Some(ref phone) = phone {
            match self
                .storage
                .contacts
                .find_by_phone(self.tenant.id, phone)
                .await?
            {
                Some(contact) => Some(contact.id),
                None => {
                    let mut contact = Contact::new(
                        self.tenant.id,
                        name.clone().unwrap_or_else(|| "Unbekannt".to_string()),
                        phone.clone(),
                    );
                    contact.address = address.clone();
                    let contact = self.storage.contacts.create(contact).await?;
                    Some(contact.id)
                }
            }
        } else {
            None
        };

        let outcome = self.triage_outcome.lock().clone();
        let (urgency, trade) = match &outcome {
            Some(o) => (o.urgency, o.category),
            None => (
                if emergency {
                    Urgency::Emergency
                } else {
                    Urgency::Normal
                },
                self.profile.fallback_trade,
            ),
        };

        let preferred_window = preferred.map(|p| PreferredWindow {
            date: p
                .day_offset
                .map(|offset| (Utc::now() + ChronoDuration::days(offset)).date_naive())
                .or(p.date),
            start: p.window.map(|w| w.bounds().0),
            end: p.window.map(|w| w.bounds().1),
        });

        let description = problem.unwrap_or_else(|| "Telefonische Anfrage".to_string());
        let draft = JobDraft {
            tenant_id: self.tenant.id,
            contact_id,
            title: truncate(&description, 60),
            description,
            trade,
            job_type: if emergency {
                call_agent_core::JobType::Emergency
            } else {
                self.profile.default_job_type
            },
            urgency: if emergency { Urgency::Emergency } else { urgency },
            source: self.channel.job_source(),
            address,
            distance_from_hq_km: None,
            preferred_window,
            access_notes: None,
            recording_consented: false,
        };

        let actor = format!("session-{}", self.session_id);
        let job = self.jobs.create(draft, &actor).await?;
        *self.created_job.lock() = Some(job.clone());
        Ok(job)
    }

    fn push_assistant(&self, text: &str) {
        self.history.lock().push(Turn::assistant(text));
    }

    fn set_state(&self, state: ConversationState) {
        let mut current = self.state.lock();
        if *current != state {
            tracing::debug!(
                session = %self.session_id,
                from = ?*current,
                to = ?state,
                "Conversation state change"
            );
            *current = state;
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_compliance::AuditLedger;
    use call_agent_core::{Department, RoutingRule, TradeCategory, Worker};
    use call_agent_dispatch::{EscalationTimers, RoutingEngine};
    use call_agent_jobs::SimulatedSmsChannel;
    use call_agent_pipeline::ScriptedLlm;
    use call_agent_scheduling::SchedulingEngine;
    use call_agent_storage::MemoryAuditStore;
    use call_agent_triage::RuleTable;

    struct Fixture {
        engine: ConversationEngine,
        storage: Storage,
        tenant: Tenant,
        jobs: Arc<JobService>,
    }

    async fn fixture(channel: Channel) -> Fixture {
        let storage = Storage::in_memory();
        let ledger = Arc::new(AuditLedger::new(Arc::new(MemoryAuditStore::new())));

        let mut tenant = Tenant::new("Mustermann Haustechnik");
        tenant.emergency_number = Some("+49301120".to_string());
        storage.tenants.create(tenant.clone()).await.unwrap();

        let department = Department::new(
            tenant.id,
            "SHK",
            vec![
                TradeCategory::PlumbingHeating,
                TradeCategory::Sanitary,
                TradeCategory::General,
            ],
        );
        let department_id = department.id;
        storage.workforce.create_department(department).await.unwrap();

        let mut worker = Worker::new(
            tenant.id,
            department_id,
            "Hans Müller",
            vec![TradeCategory::PlumbingHeating, TradeCategory::General],
        );
        worker.phone = "+49170111".to_string();
        worker.on_emergency_duty = true;
        storage.workforce.create_worker(worker).await.unwrap();

        storage
            .rules
            .create(RoutingRule::fallback(tenant.id, department_id))
            .await
            .unwrap();

        let routing = Arc::new(RoutingEngine::new(
            storage.rules.clone(),
            storage.workforce.clone(),
        ));
        let scheduling = Arc::new(SchedulingEngine::new(storage.calendar.clone()));
        let (escalations, _rx) = EscalationTimers::new(16);
        let jobs = Arc::new(JobService::new(
            storage.clone(),
            routing,
            scheduling,
            ledger,
            vec![Arc::new(SimulatedSmsChannel::new())],
            escalations,
        ));

        let engine = ConversationEngine::new(
            Uuid::new_v4(),
            tenant.clone(),
            channel,
            IndustryProfile::trades(),
            EngineConfig::default(),
            Arc::new(ScriptedLlm::new()),
            TriageEngine::new(RuleTable::builtin(1)),
            jobs.clone(),
            storage.clone(),
        );

        Fixture {
            engine,
            storage,
            tenant,
            jobs,
        }
    }

    #[tokio::test]
    async fn test_greeting() {
        let f = fixture(Channel::Chat).await;
        let response = f.engine.start();
        assert_eq!(response.state, ConversationState::Greeting);
        assert!(response.text.contains("Guten Tag"));
    }

    #[tokio::test]
    async fn test_full_booking_flow() {
        let f = fixture(Channel::Chat).await;
        f.engine.start();

        let r = f.engine.handle_user_text("Hallo").await.unwrap();
        assert_eq!(r.state, ConversationState::Intake);

        let r = f
            .engine
            .handle_user_text("Meine Heizung ist kalt")
            .await
            .unwrap();
        assert_eq!(r.state, ConversationState::SlotFill);

        let r = f.engine.handle_user_text("Max Mustermann").await.unwrap();
        assert_eq!(r.state, ConversationState::SlotFill);

        let r = f.engine.handle_user_text("+49 30 1234567").await.unwrap();
        assert_eq!(r.state, ConversationState::SlotFill);

        let r = f
            .engine
            .handle_user_text("Musterstr. 1, 10115 Berlin")
            .await
            .unwrap();
        assert_eq!(r.state, ConversationState::SlotFill);

        let r = f.engine.handle_user_text("morgen vormittag").await.unwrap();
        assert_eq!(r.state, ConversationState::Confirmation);
        assert!(r.text.contains("Max Mustermann"));

        let r = f.engine.handle_user_text("Ja, passt").await.unwrap();
        assert!(r.end_session);
        let job = r.job.expect("job created");
        assert!(job.job_number.0.starts_with("JOB-"));
        assert_eq!(job.trade, TradeCategory::PlumbingHeating);
        assert_eq!(job.urgency, Urgency::Urgent);
        assert!(r.text.contains(&job.job_number.0));

        // Contact was created under the tenant
        let contact = f
            .storage
            .contacts
            .find_by_phone(f.tenant.id, "+49301234567")
            .await
            .unwrap();
        assert!(contact.is_some());
    }

    #[tokio::test]
    async fn test_emergency_escalation() {
        let f = fixture(Channel::Phone).await;
        f.engine.start();

        let r = f
            .engine
            .handle_user_text("Ich rieche Gas in der Küche!")
            .await
            .unwrap();

        assert_eq!(r.state, ConversationState::Escalation);
        assert!(r.escalated);
        assert!(r.critical);
        assert_eq!(r.transfer_to.as_deref(), Some("+49301120"));
        assert!(r.text.contains("Verlassen Sie sofort das Gebäude"));

        let job = r.job.expect("emergency job");
        assert_eq!(job.urgency, Urgency::Emergency);
        assert_eq!(job.trade, TradeCategory::PlumbingHeating);
        assert!(f.engine.is_escalated());
    }

    #[tokio::test]
    async fn test_low_confidence_reprompts_without_advancing() {
        let f = fixture(Channel::Phone).await;
        f.engine.start();

        let before_state = f.engine.state();
        let before_turns = f.engine.turn_count();

        let transcript = TranscriptResult::new("unverständlich", 0.3);
        let r = f.engine.handle_transcript(&transcript).await.unwrap();

        assert!(r.text.contains("wiederholen"));
        assert_eq!(f.engine.state(), before_state);
        assert_eq!(f.engine.turn_count(), before_turns);
    }

    #[tokio::test]
    async fn test_llm_timeout_falls_back_to_template() {
        let f = fixture(Channel::Chat).await;
        let llm = Arc::new(ScriptedLlm::new());
        llm.set_delay(Duration::from_secs(6));

        let engine = ConversationEngine::new(
            Uuid::new_v4(),
            f.tenant.clone(),
            Channel::Chat,
            IndustryProfile::trades(),
            EngineConfig {
                llm_soft_timeout: Duration::from_millis(50),
                ..Default::default()
            },
            llm,
            TriageEngine::new(RuleTable::builtin(1)),
            f.jobs.clone(),
            f.storage.clone(),
        );

        engine.start();
        // Open question with no problem statement goes through the LLM
        let r = engine
            .handle_user_text("Wie sind Ihre Öffnungszeiten?")
            .await
            .unwrap();

        assert_eq!(r.text, IndustryProfile::trades().llm_fallback);
        assert!(!r.end_session);
    }

    #[tokio::test]
    async fn test_idle_timeout_reprompts_once_then_ends() {
        let f = fixture(Channel::Phone).await;
        f.engine.start();

        let first = f.engine.handle_idle_timeout();
        assert!(!first.end_session);
        assert!(first.text.contains("noch da"));

        let second = f.engine.handle_idle_timeout();
        assert!(second.end_session);

        let summary = f.engine.summary(SessionEnd::Abandoned);
        assert_eq!(summary.outcome, SessionOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_negative_confirmation_returns_to_slot_fill() {
        let f = fixture(Channel::Chat).await;
        f.engine.start();

        f.engine
            .handle_user_text("Meine Heizung ist kalt")
            .await
            .unwrap();
        f.engine.handle_user_text("Max Mustermann").await.unwrap();
        f.engine.handle_user_text("+49 30 1234567").await.unwrap();
        f.engine
            .handle_user_text("Musterstr. 1, 10115 Berlin")
            .await
            .unwrap();
        let r = f.engine.handle_user_text("morgen vormittag").await.unwrap();
        assert_eq!(r.state, ConversationState::Confirmation);

        let r = f.engine.handle_user_text("Nein, das ist falsch").await.unwrap();
        assert_eq!(r.state, ConversationState::SlotFill);
        assert!(!r.end_session);
    }

    #[tokio::test]
    async fn test_summary_contains_transcript() {
        let f = fixture(Channel::Chat).await;
        f.engine.start();
        f.engine.handle_user_text("Hallo").await.unwrap();

        let summary = f.engine.summary(SessionEnd::Completed);
        assert!(summary.transcript.contains("user: Hallo"));
        assert_eq!(summary.turn_count, 1);
        assert_eq!(summary.channel, "chat");
    }
}
