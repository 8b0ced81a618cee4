//! End-to-end call and chat flows over the full service graph

use std::sync::Arc;
use std::time::Duration;

use call_agent_agent::{Channel, ProfileKey, SessionEnd};
use call_agent_config::Settings;
use call_agent_core::{
    AudioFrame, Department, JobStatus, RoutingRule, SampleRate, Tenant, TenantId, TradeCategory,
    Urgency, Worker,
};
use call_agent_pipeline::{ScriptedLlm, ScriptedStt};
use call_agent_server::phone::run_phone_session;
use call_agent_server::AppState;
use call_agent_storage::JobFilter;

/// Seed a tenant with one SHK department and one emergency-capable worker
async fn seed_tenant(state: &AppState) -> (TenantId, uuid::Uuid) {
    let mut tenant = Tenant::new("Mustermann Haustechnik");
    tenant.emergency_number = Some("+49301120".to_string());
    let tenant_id = tenant.id;
    state.storage.tenants.create(tenant).await.unwrap();

    let department = Department::new(
        tenant_id,
        "SHK",
        vec![
            TradeCategory::PlumbingHeating,
            TradeCategory::Sanitary,
            TradeCategory::General,
        ],
    );
    let department_id = department.id;
    state
        .storage
        .workforce
        .create_department(department)
        .await
        .unwrap();

    let mut worker = Worker::new(
        tenant_id,
        department_id,
        "Hans Müller",
        vec![TradeCategory::PlumbingHeating, TradeCategory::General],
    );
    worker.phone = "+49170111".to_string();
    worker.on_emergency_duty = true;
    let worker_id = worker.id;
    state.storage.workforce.create_worker(worker).await.unwrap();

    state
        .storage
        .rules
        .create(RoutingRule::fallback(tenant_id, department_id))
        .await
        .unwrap();

    (tenant_id, worker_id)
}

fn voiced_frame(seq: u64) -> AudioFrame {
    AudioFrame::new(vec![8_000i16; 320], SampleRate::Hz16000, seq, seq * 20)
}

fn silent_frame(seq: u64) -> AudioFrame {
    AudioFrame::new(vec![0i16; 320], SampleRate::Hz16000, seq, seq * 20)
}

#[tokio::test]
async fn emergency_phone_call_creates_job_and_transfers() {
    let stt = Arc::new(ScriptedStt::new());
    stt.push_text("Ich rieche Gas in der Küche!", 0.95);

    let state = AppState::with_ai(
        Settings::default(),
        stt.clone(),
        Arc::new(ScriptedLlm::new()),
        None,
    );
    let (tenant, _worker) = seed_tenant(&state).await;

    let (call_id, events) = state.telephony.inject_call("+4930555", "+4930999");
    let driver = tokio::spawn(run_phone_session(
        state.clone(),
        tenant,
        ProfileKey::Trades,
        call_id,
        events,
    ));

    // Let the greeting go out, then speak one utterance
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut seq = 0;
    for _ in 0..15 {
        // The driver may already be tearing the call down; late frames are fine to drop
        let _ = state.telephony.inject_audio(call_id, voiced_frame(seq)).await;
        seq += 1;
    }
    for _ in 0..40 {
        let _ = state.telephony.inject_audio(call_id, silent_frame(seq)).await;
        seq += 1;
    }

    // The driver transfers to the emergency number and hangs up
    tokio::time::timeout(Duration::from_secs(5), driver)
        .await
        .expect("driver finished")
        .unwrap();

    assert_eq!(state.telephony.transfers(call_id), vec!["+49301120"]);
    assert!(state.telephony.is_ended(call_id));

    let jobs = state
        .storage
        .jobs
        .list(tenant, &JobFilter::default())
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].urgency, Urgency::Emergency);
    assert_eq!(jobs[0].trade, TradeCategory::PlumbingHeating);

    // Session summary is flagged escalated
    let summaries = state.storage.summaries.list(tenant).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].escalated);

    // Audit trail records the creation and the chain verifies
    let report = state.ledger.verify(tenant).await.unwrap();
    assert!(report.valid);
    assert!(report.rows_checked >= 1);
}

#[tokio::test]
async fn chat_booking_flow_produces_numbered_job() {
    let state = AppState::new(Settings::default());
    let (tenant, _worker) = seed_tenant(&state).await;

    let session = state
        .sessions
        .open(tenant, Channel::Chat, ProfileKey::Trades)
        .await
        .unwrap();
    session.engine.start();

    for message in [
        "Hallo",
        "Meine Heizung ist kalt",
        "Max Mustermann",
        "+49 30 1234567",
        "Musterstr. 1, 10115 Berlin",
        "morgen vormittag",
    ] {
        session.engine.handle_user_text(message).await.unwrap();
    }

    let response = session.engine.handle_user_text("Ja, gerne").await.unwrap();
    assert!(response.end_session);
    let job = response.job.expect("job created");
    assert!(job.job_number.0.starts_with("JOB-"));
    assert_eq!(job.urgency, Urgency::Urgent);
    assert_eq!(job.trade, TradeCategory::PlumbingHeating);

    state
        .sessions
        .close(session.id, SessionEnd::Completed)
        .await;

    let stored = state
        .storage
        .jobs
        .get(tenant, job.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, JobStatus::Assigned);
    assert!(stored.assigned_worker.is_some());
}

#[tokio::test]
async fn concurrent_chat_bookings_get_distinct_slots() {
    let state = AppState::new(Settings::default());
    let (tenant, _worker) = seed_tenant(&state).await;

    let run_chat = |state: AppState, tenant| async move {
        let session = state
            .sessions
            .open(tenant, Channel::Chat, ProfileKey::Trades)
            .await
            .unwrap();
        session.engine.start();
        for message in [
            "Meine Heizung ist kalt",
            "Max Mustermann",
            "+49 30 1234567",
            "Musterstr. 1, 10115 Berlin",
            "morgen vormittag",
        ] {
            session.engine.handle_user_text(message).await.unwrap();
        }
        let response = session.engine.handle_user_text("Ja").await.unwrap();
        response.job.expect("job created")
    };

    let (a, b) = tokio::join!(
        tokio::spawn(run_chat(state.clone(), tenant)),
        tokio::spawn(run_chat(state.clone(), tenant))
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.job_number, b.job_number);

    // When both got booked, the slots must differ
    let a = state.storage.jobs.get(tenant, a.id).await.unwrap().unwrap();
    let b = state.storage.jobs.get(tenant, b.id).await.unwrap().unwrap();
    if let (Some(slot_a), Some(slot_b)) = (a.scheduled_at, b.scheduled_at) {
        assert_ne!(slot_a, slot_b);
    }
}

#[tokio::test]
async fn session_cap_rejects_with_busy() {
    let mut settings = Settings::default();
    settings.session.max_concurrent = 1;
    let state = AppState::new(settings);
    let (tenant, _worker) = seed_tenant(&state).await;

    let _held = state
        .sessions
        .open(tenant, Channel::Chat, ProfileKey::Trades)
        .await
        .unwrap();

    let (call_id, events) = state.telephony.inject_call("+4930555", "+4930999");
    run_phone_session(state.clone(), tenant, ProfileKey::Trades, call_id, events).await;

    // Busy signal: the call was ended without a session
    assert!(state.telephony.is_ended(call_id));
    assert_eq!(state.sessions.count(), 1);
}
