//! REST surface
//!
//! Tenant-scoped API under `/api/v1`. Every request carries the tenant id in
//! the `X-Tenant-Id` header; handlers never touch rows of other tenants.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use call_agent_core::{
    Address, GeoPoint, JobDraft, JobSource, JobStatus, JobType, TenantId, TradeCategory, Urgency,
};
use call_agent_dispatch::{MatchOutcome, MatchRequest, TechnicianMatcher};
use call_agent_jobs::StatusUpdate;
use call_agent_scheduling::{SlotCriteria, TimeSlot, TimeWindow};
use call_agent_storage::{ConsentKind, ConsentMethod, JobFilter};
use call_agent_triage::{CallerContext, RuleTable, TriageEngine};
use call_agent_core::JobHistoryEntry;

use crate::error::ApiError;
use crate::state::AppState;
use crate::webhooks;
use crate::ws;

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Jobs
        .route("/api/v1/jobs", post(create_job).get(list_jobs))
        .route("/api/v1/jobs/stats", get(job_stats))
        .route("/api/v1/jobs/:id", get(get_job).delete(cancel_job))
        .route("/api/v1/jobs/:id/status", patch(update_job_status))
        .route("/api/v1/jobs/:id/assign", patch(assign_job))

        // Triage and matching
        .route("/api/v1/triage/assess", post(triage_assess))
        .route("/api/v1/technicians/search", post(search_technicians))

        // Appointments
        .route("/api/v1/appointments/slots", post(search_slots))
        .route("/api/v1/appointments/book", post(book_slot))

        // Consent and compliance
        .route("/api/v1/consent/:contact_id", get(get_consents).post(grant_consent))
        .route("/api/v1/consent/:contact_id/:kind", delete(revoke_consent))
        .route("/api/v1/audit", get(query_audit))
        .route("/api/v1/audit/integrity", get(audit_integrity))
        .route("/api/v1/export/:contact_id", get(export_contact))
        .route("/api/v1/erasure/:contact_id", delete(erase_contact))

        // Chat and webhooks
        .route("/ws/chat", get(ws::chat_handler))
        .route("/webhooks/telephony", post(webhooks::telephony_webhook))

        // Health
        .route("/health", get(health))

        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Resolve the tenant from the `X-Tenant-Id` header
pub fn tenant_from(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let value = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::validation("missing X-Tenant-Id header", Some("x-tenant-id".to_string()))
        })?;
    let id = Uuid::parse_str(value).map_err(|_| {
        ApiError::validation("invalid tenant id", Some("x-tenant-id".to_string()))
    })?;
    Ok(TenantId(id))
}

fn require_admin(headers: &HeaderMap) -> Result<(), ApiError> {
    let role = headers.get("x-role").and_then(|v| v.to_str().ok());
    if role != Some("admin") {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "admin role required",
        ));
    }
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Jobs

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    title: String,
    description: String,
    trade: TradeCategory,
    urgency: Urgency,
    #[serde(default)]
    job_type: Option<JobType>,
    #[serde(default)]
    contact_id: Option<Uuid>,
    #[serde(default)]
    address: Option<AddressInput>,
    #[serde(default)]
    access_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressInput {
    street: String,
    house_number: String,
    postal_code: String,
    city: String,
}

impl AddressInput {
    fn into_address(self) -> Result<Address, ApiError> {
        Address::new(self.street, self.house_number, self.postal_code, self.city)
            .map_err(|e| ApiError::validation(e.to_string(), Some("address".to_string())))
    }
}

async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("title must not be empty", Some("title".to_string())));
    }

    let address = request.address.map(|a| a.into_address()).transpose()?;
    let draft = JobDraft {
        tenant_id: tenant,
        contact_id: request.contact_id,
        title: request.title,
        description: request.description,
        trade: request.trade,
        job_type: request.job_type.unwrap_or(JobType::Repair),
        urgency: request.urgency,
        source: JobSource::Form,
        address,
        distance_from_hq_km: None,
        preferred_window: None,
        access_notes: request.access_notes,
        recording_consented: false,
    };

    let job = state.jobs.create(draft, "api").await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
struct JobListQuery {
    status: Option<JobStatus>,
    urgency: Option<Urgency>,
    trade: Option<TradeCategory>,
    source: Option<JobSource>,
    q: Option<String>,
    created_after: Option<chrono::DateTime<Utc>>,
    created_before: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;

    let filter = JobFilter {
        status: query.status,
        urgency: query.urgency,
        trade: query.trade,
        source: query.source,
        text: query.q,
        created_after: query.created_after,
        created_before: query.created_before,
        offset: query.offset,
        limit: Some(query.limit.unwrap_or(50).min(200)),
        ..Default::default()
    };

    let jobs = state.storage.jobs.list(tenant, &filter).await?;
    Ok(Json(serde_json::json!({
        "jobs": jobs,
        "count": jobs.len(),
        "offset": filter.offset,
    })))
}

async fn job_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let counts = state.storage.jobs.counts_by_status(tenant).await?;
    Ok(Json(serde_json::json!({ "by_status": counts })))
}

async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let job = state
        .storage
        .jobs
        .get(tenant, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {}", id)))?;
    let history = state.storage.jobs.history(tenant, id).await?;

    Ok(Json(serde_json::json!({ "job": job, "history": history })))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: JobStatus,
    #[serde(default)]
    reason: Option<String>,
}

async fn update_job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let job = state
        .jobs
        .update_status(
            tenant,
            StatusUpdate {
                job_id: id,
                new_status: request.status,
                actor: "api".to_string(),
                reason: request.reason,
            },
        )
        .await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    worker_id: Uuid,
}

async fn assign_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let job = state
        .jobs
        .assign_worker(tenant, id, request.worker_id, "api")
        .await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct CancelQuery {
    #[serde(default)]
    reason: Option<String>,
}

async fn cancel_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<CancelQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let job = state
        .jobs
        .update_status(
            tenant,
            StatusUpdate {
                job_id: id,
                new_status: JobStatus::Cancelled,
                actor: "api".to_string(),
                reason: query.reason,
            },
        )
        .await?;
    Ok(Json(job))
}

// ---------------------------------------------------------------------------
// Triage and technician search

#[derive(Debug, Deserialize)]
struct TriageRequest {
    description: String,
    #[serde(default)]
    context: Option<CallerContext>,
}

async fn triage_assess(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TriageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    if request.description.trim().is_empty() {
        return Err(ApiError::validation(
            "description must not be empty",
            Some("description".to_string()),
        ));
    }

    // Pure evaluation, no side effects
    let preferred = state
        .storage
        .tenants
        .get(tenant)
        .await?
        .and_then(|t| t.preferred_trade)
        .and_then(|t| parse_trade(&t));
    let engine = TriageEngine::new(RuleTable::builtin(state.settings.triage.rules_version))
        .with_preferred_category(preferred);

    let outcome = engine.assess(&request.description, &request.context.unwrap_or_default());
    Ok(Json(outcome))
}

fn parse_trade(s: &str) -> Option<TradeCategory> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

#[derive(Debug, Deserialize)]
struct TechnicianSearchRequest {
    trade: TradeCategory,
    urgency: Urgency,
    #[serde(default)]
    department_id: Option<Uuid>,
    #[serde(default)]
    location: Option<GeoPoint>,
}

async fn search_technicians(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TechnicianSearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let tenant_info = state
        .storage
        .tenants
        .get(tenant)
        .await?
        .ok_or_else(|| ApiError::not_found("tenant"))?;

    let workers = state
        .storage
        .workforce
        .list_workers(tenant, request.department_id)
        .await?;

    let mut match_request = MatchRequest::new(request.trade, request.urgency);
    match_request.location = request.location;
    match_request.service_radius_km = tenant_info.service_radius_km;

    match TechnicianMatcher::rank(&match_request, &workers) {
        MatchOutcome::Ranked(matches) => Ok(Json(serde_json::json!({ "matches": matches }))),
        MatchOutcome::NoneAvailable => Ok(Json(serde_json::json!({
            "matches": [],
            "none_available": true,
        }))),
    }
}

// ---------------------------------------------------------------------------
// Appointments

#[derive(Debug, Deserialize)]
struct SlotSearchRequest {
    urgency: Urgency,
    #[serde(default)]
    job_type: Option<JobType>,
    #[serde(default)]
    technician_id: Option<Uuid>,
    #[serde(default)]
    preferred_date: Option<NaiveDate>,
    #[serde(default)]
    preferred_window: Option<TimeWindow>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn search_slots(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SlotSearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let tenant_info = state
        .storage
        .tenants
        .get(tenant)
        .await?
        .ok_or_else(|| ApiError::not_found("tenant"))?;

    let workers = state.storage.workforce.list_workers(tenant, None).await?;
    let technicians: Vec<_> = workers
        .into_iter()
        .filter(|w| request.technician_id.map(|id| w.id == id).unwrap_or(true))
        .collect();

    let mut criteria = SlotCriteria::new(
        tenant,
        request.urgency,
        request.job_type.unwrap_or(JobType::Repair),
    );
    criteria.preferred_date = request.preferred_date;
    criteria.preferred_window = request.preferred_window;
    criteria.limit = request.limit.unwrap_or(10).min(50);

    let slots = state
        .scheduling
        .find_slots(&criteria, &tenant_info.business_hours, &technicians, Utc::now())
        .await?;

    Ok(Json(serde_json::json!({ "slots": slots })))
}

#[derive(Debug, Deserialize)]
struct BookRequest {
    job_id: Uuid,
    slot: TimeSlot,
}

#[derive(Debug, Serialize)]
struct BookResponse {
    job_id: Uuid,
    scheduled_at: chrono::DateTime<Utc>,
    technician_id: Uuid,
}

async fn book_slot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;

    let mut job = state
        .storage
        .jobs
        .get(tenant, request.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {}", request.job_id)))?;

    // Terminal jobs must not consume calendar slots
    if job.status.is_terminal() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "job_terminal",
            format!("job {} is {}", job.job_number, job.status.as_str()),
        ));
    }

    state.scheduling.book(&request.slot, tenant, job.id).await?;

    let scheduled_at = request.slot.date.and_time(request.slot.start).and_utc();
    job.scheduled_at = Some(scheduled_at);
    job.assigned_worker = Some(request.slot.technician_id);
    if job.status == JobStatus::New {
        job.transition(JobStatus::Assigned)?;
    }
    job.updated_at = Utc::now();

    let history = JobHistoryEntry::new(job.id, "api", "scheduled").with_detail(
        serde_json::json!({
            "date": request.slot.date,
            "start": request.slot.start,
            "technician": request.slot.technician_id,
        }),
    );
    state.storage.jobs.update(job.clone(), history).await?;

    Ok(Json(BookResponse {
        job_id: job.id,
        scheduled_at,
        technician_id: request.slot.technician_id,
    }))
}

// ---------------------------------------------------------------------------
// Consent, audit, export, erasure

async fn get_consents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let records = state.consents.records_for(tenant, contact_id).await?;
    Ok(Json(serde_json::json!({ "consents": records })))
}

#[derive(Debug, Deserialize)]
struct GrantConsentRequest {
    kind: String,
    method: ConsentMethod,
    #[serde(default)]
    call_id: Option<Uuid>,
}

async fn grant_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
    Json(request): Json<GrantConsentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let kind = ConsentKind::parse(&request.kind)
        .ok_or_else(|| ApiError::validation("unknown consent kind", Some("kind".to_string())))?;

    let record = state
        .consents
        .grant(tenant, contact_id, kind, request.method, request.call_id)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn revoke_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((contact_id, kind)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let kind = ConsentKind::parse(&kind)
        .ok_or_else(|| ApiError::validation("unknown consent kind", Some("kind".to_string())))?;

    let record = state.consents.revoke(tenant, contact_id, kind).await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    #[serde(default)]
    entity_kind: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
}

async fn query_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    require_admin(&headers)?;

    let rows = match query.entity_kind {
        Some(kind) => {
            state
                .ledger
                .for_entity(tenant, &kind, query.entity_id.as_deref())
                .await?
        }
        None => state.ledger.all(tenant).await?,
    };
    Ok(Json(serde_json::json!({ "entries": rows })))
}

async fn audit_integrity(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    require_admin(&headers)?;

    let report = state.ledger.verify(tenant).await?;
    if !report.valid {
        tracing::error!(tenant = %tenant, ?report.first_broken_seq, "Audit chain broken");
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::to_value(&report).unwrap_or_default()),
        ));
    }
    Ok((StatusCode::OK, Json(serde_json::to_value(&report).unwrap_or_default())))
}

async fn export_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let export = state.erasure.export(tenant, contact_id).await?;
    Ok(Json(export))
}

async fn erase_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_from(&headers)?;
    let scrubbed = state.erasure.erase(tenant, contact_id).await?;
    Ok(Json(serde_json::json!({
        "erased": true,
        "entities_scrubbed": scrubbed,
    })))
}
