//! Integration tests for industry profile conversation flows

use std::sync::Arc;
use uuid::Uuid;

use call_agent_agent::{
    Channel, ConversationEngine, ConversationState, EngineConfig, IndustryProfile,
};
use call_agent_compliance::AuditLedger;
use call_agent_core::{Department, RoutingRule, Tenant, TradeCategory, Urgency, Worker};
use call_agent_dispatch::{EscalationTimers, RoutingEngine};
use call_agent_jobs::JobService;
use call_agent_pipeline::ScriptedLlm;
use call_agent_scheduling::SchedulingEngine;
use call_agent_storage::{MemoryAuditStore, Storage};
use call_agent_triage::{RuleTable, TriageEngine};

async fn engine_for(profile: IndustryProfile, channel: Channel) -> ConversationEngine {
    let storage = Storage::in_memory();
    let ledger = Arc::new(AuditLedger::new(Arc::new(MemoryAuditStore::new())));

    let mut tenant = Tenant::new("Testbetrieb");
    tenant.emergency_number = Some("+49112".to_string());
    storage.tenants.create(tenant.clone()).await.unwrap();

    let department = Department::new(
        tenant.id,
        "Allgemein",
        vec![
            TradeCategory::PlumbingHeating,
            TradeCategory::Electrical,
            TradeCategory::Sanitary,
            TradeCategory::General,
        ],
    );
    let department_id = department.id;
    storage.workforce.create_department(department).await.unwrap();

    let mut worker = Worker::new(
        tenant.id,
        department_id,
        "Erika Beispiel",
        vec![TradeCategory::General, TradeCategory::PlumbingHeating],
    );
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
    let (escalations, _rx) = EscalationTimers::new(8);
    let jobs = Arc::new(JobService::new(
        storage.clone(),
        routing,
        scheduling,
        ledger,
        Vec::new(),
        escalations,
    ));

    ConversationEngine::new(
        Uuid::new_v4(),
        tenant,
        channel,
        profile,
        EngineConfig::default(),
        Arc::new(ScriptedLlm::new()),
        TriageEngine::new(RuleTable::builtin(1)),
        jobs,
        storage,
    )
}

#[tokio::test]
async fn healthcare_emergency_phrase_escalates() {
    let engine = engine_for(IndustryProfile::healthcare(), Channel::Phone).await;
    engine.start();

    let response = engine
        .handle_user_text("Mein Mann hat starke Brustschmerzen und Atemnot")
        .await
        .unwrap();

    assert_eq!(response.state, ConversationState::Escalation);
    assert!(response.escalated);
    assert!(response.critical);
    assert!(response.text.contains("112"));
}

#[tokio::test]
async fn professional_services_quote_flow() {
    let engine = engine_for(IndustryProfile::professional_services(), Channel::Chat).await;
    engine.start();

    let response = engine
        .handle_user_text("Ich brauche ein Angebot für eine Steuerberatung")
        .await
        .unwrap();
    // Quote vocabulary counts as a problem statement and moves to slot fill
    assert_eq!(response.state, ConversationState::SlotFill);

    engine.handle_user_text("Erika Beispiel").await.unwrap();
    engine.handle_user_text("+49 170 5556677").await.unwrap();
    engine
        .handle_user_text("Kanzleiweg 2, 20095 Hamburg")
        .await
        .unwrap();
    let response = engine.handle_user_text("übermorgen nachmittag").await.unwrap();
    assert_eq!(response.state, ConversationState::Confirmation);

    let response = engine.handle_user_text("Ja, einverstanden").await.unwrap();
    let job = response.job.expect("job created");
    assert_eq!(job.urgency, Urgency::Routine);
}

#[tokio::test]
async fn hospitality_reservation_reaches_confirmation() {
    let engine = engine_for(IndustryProfile::hospitality(), Channel::Chat).await;
    engine.start();

    engine
        .handle_user_text("Ich möchte einen Tisch reservieren, am liebsten morgen abend")
        .await
        .unwrap();
    engine.handle_user_text("Familie Beispiel").await.unwrap();
    engine.handle_user_text("+49 40 1234567").await.unwrap();
    let response = engine
        .handle_user_text("Gastgasse 3, 20095 Hamburg")
        .await
        .unwrap();

    assert_eq!(response.state, ConversationState::Confirmation);
    assert!(response.text.contains("Familie Beispiel"));
}
