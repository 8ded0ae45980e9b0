use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::access::{access_level, project_candidate, ProfileAccess};
use super::domain::{
    ActorContext, ActorRole, ApplicationId, ApplicationStatus, CandidateId, EmployerId,
    InterviewId, JobId, OfferId, PaymentMethod, PlacementId, SlotId,
};
use super::error::PipelineError;
use super::ledger::{PaymentGateway, PaymentKind, PaymentLedger};
use super::negotiation::{AvailabilityNegotiator, SlotWindow};
use super::repository::{NotificationPublisher, PaymentLeg, PipelineRepository};
use super::service::{OfferDecision, OfferTerms, PipelineService};
use super::sweeper::{ExpirationSweeper, SweepKind};

/// Everything the command surface needs, shared behind one `Arc`.
pub struct PipelineState<R, N, G> {
    pub service: PipelineService<R>,
    pub negotiator: AvailabilityNegotiator<R>,
    pub sweeper: ExpirationSweeper<R, N>,
    pub ledger: PaymentLedger<R, G>,
    pub repository: Arc<R>,
    /// Shared secret expected from the external scheduler.
    pub sweep_token: String,
}

/// Router builder exposing the pipeline command surface.
pub fn pipeline_router<R, N, G>(state: Arc<PipelineState<R, N, G>>) -> Router
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/pipeline/applications",
            post(submit_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/review",
            post(review_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/claim",
            post(claim_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/release",
            post(release_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/offer",
            post(make_offer_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/interview",
            post(propose_slots_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/offers/:offer_id/respond",
            post(respond_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/offers/:offer_id/withdraw",
            post(withdraw_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/interviews/:interview_id/select",
            post(select_slots_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/interviews/:interview_id/confirm",
            post(confirm_slot_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/interviews/:interview_id/attendance",
            post(attendance_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/interviews/:interview_id/reschedule",
            post(reschedule_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/interviews/:interview_id/complete",
            post(complete_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/interviews/:interview_id/cancel",
            post(cancel_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/placements/:placement_id/payments",
            post(record_payment_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/placements/:placement_id/intents",
            post(create_intent_handler::<R, N, G>),
        )
        .route(
            "/api/v1/pipeline/candidates/:candidate_id/profile",
            get(candidate_profile_handler::<R, N, G>),
        )
        .route("/api/v1/pipeline/sweep/:kind", post(sweep_handler::<R, N, G>))
        .with_state(state)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = header_value(parts, "x-actor-id")
            .ok_or_else(|| unauthorized("missing x-actor-id header"))?;
        let role = match header_value(parts, "x-actor-role").as_deref() {
            Some("candidate") => ActorRole::Candidate,
            Some("employer") => ActorRole::Employer,
            Some("admin") => ActorRole::Admin,
            Some(other) => return Err(unauthorized(&format!("unknown actor role '{other}'"))),
            None => return Err(unauthorized("missing x-actor-role header")),
        };
        Ok(ActorContext { actor_id, role })
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SubmitApplicationRequest {
    candidate_id: String,
    job_id: String,
    #[serde(default)]
    cover_letter: Option<String>,
}

async fn submit_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.service.submit_application(
        &actor,
        CandidateId(request.candidate_id),
        JobId(request.job_id),
        request.cover_letter,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    status: ApplicationStatus,
}

async fn review_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(application_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.service.review_application(
        &actor,
        &ApplicationId(application_id),
        request.status,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

async fn claim_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(application_id): Path<String>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state
        .service
        .claim_application(&actor, &ApplicationId(application_id))?;
    Ok(Json(outcome).into_response())
}

async fn release_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(application_id): Path<String>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state
        .service
        .release_claim(&actor, &ApplicationId(application_id))?;
    Ok(Json(outcome).into_response())
}

async fn make_offer_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(application_id): Path<String>,
    Json(terms): Json<OfferTerms>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.service.make_offer(
        &actor,
        &ApplicationId(application_id),
        terms,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
struct RespondRequest {
    decision: OfferDecision,
    #[serde(default)]
    note: Option<String>,
}

async fn respond_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(offer_id): Path<String>,
    Json(request): Json<RespondRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.service.respond_to_offer(
        &actor,
        &OfferId(offer_id),
        request.decision,
        request.note,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn withdraw_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(offer_id): Path<String>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.service.withdraw_offer(
        &actor,
        &OfferId(offer_id),
        request.reason,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct ProposeSlotsRequest {
    windows: Vec<SlotWindow>,
    duration_minutes: u32,
    #[serde(default = "default_round")]
    round: u8,
}

fn default_round() -> u8 {
    1
}

async fn propose_slots_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(application_id): Path<String>,
    Json(request): Json<ProposeSlotsRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.negotiator.propose_slots(
        &actor,
        &ApplicationId(application_id),
        request.windows,
        request.duration_minutes,
        request.round,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
struct SelectSlotsRequest {
    slot_ids: Vec<String>,
}

async fn select_slots_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(interview_id): Path<String>,
    Json(request): Json<SelectSlotsRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let slot_ids = request.slot_ids.into_iter().map(SlotId).collect();
    let outcome =
        state
            .negotiator
            .select_slots(&actor, &InterviewId(interview_id), slot_ids)?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct ConfirmSlotRequest {
    slot_id: String,
    #[serde(default)]
    meeting_details: Option<String>,
}

async fn confirm_slot_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(interview_id): Path<String>,
    Json(request): Json<ConfirmSlotRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.negotiator.confirm_slot(
        &actor,
        &InterviewId(interview_id),
        &SlotId(request.slot_id),
        request.meeting_details,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

async fn attendance_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(interview_id): Path<String>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state
        .negotiator
        .confirm_attendance(&actor, &InterviewId(interview_id))?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct RescheduleRequest {
    reason: String,
}

async fn reschedule_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(interview_id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.negotiator.request_reschedule(
        &actor,
        &InterviewId(interview_id),
        request.reason,
    )?;
    Ok(Json(outcome).into_response())
}

async fn complete_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(interview_id): Path<String>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.negotiator.complete_interview(
        &actor,
        &InterviewId(interview_id),
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn cancel_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(interview_id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.negotiator.cancel_interview(
        &actor,
        &InterviewId(interview_id),
        request.reason,
    )?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct RecordPaymentRequest {
    kind: PaymentKind,
    #[serde(default)]
    amount: Option<i64>,
    method: PaymentMethod,
    #[serde(default)]
    transaction_id: Option<String>,
}

async fn record_payment_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(placement_id): Path<String>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.ledger.record_payment(
        &actor,
        &PlacementId(placement_id),
        request.kind,
        request.amount,
        request.method,
        request.transaction_id,
        Utc::now(),
    )?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct IntentRequest {
    leg: PaymentLeg,
}

async fn create_intent_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(placement_id): Path<String>,
    Json(request): Json<IntentRequest>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let intent = state.ledger.create_payment_intent(
        &actor,
        &PlacementId(placement_id),
        request.leg,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(intent)).into_response())
}

async fn candidate_profile_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    actor: ActorContext,
    Path(candidate_id): Path<String>,
) -> Result<Response, PipelineError>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let candidate_id = CandidateId(candidate_id);
    let candidate = state
        .repository
        .fetch_candidate(&candidate_id)?
        .ok_or_else(|| PipelineError::NotFound(format!("candidate {}", candidate_id.0)))?;

    let view = match actor.role {
        ActorRole::Admin => project_candidate(&candidate, ProfileAccess::FullAccess),
        ActorRole::Employer => {
            let employer_id = EmployerId(actor.actor_id.clone());
            let employer = state
                .repository
                .fetch_employer(&employer_id)?
                .ok_or_else(|| PipelineError::NotFound(format!("employer {}", employer_id.0)))?;
            let introduction = state
                .repository
                .fetch_introduction(&employer.id, &candidate.id)?;
            let access = access_level(&employer, introduction.as_ref());
            project_candidate(&candidate, access)
        }
        ActorRole::Candidate => {
            return Err(PipelineError::Forbidden(
                "candidates browse profiles through their own surface".to_string(),
            ));
        }
    };
    Ok(Json(view).into_response())
}

async fn sweep_handler<R, N, G>(
    State(state): State<Arc<PipelineState<R, N, G>>>,
    Path(kind): Path<String>,
    parts: axum::http::HeaderMap,
) -> Response
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
    G: PaymentGateway + 'static,
{
    let presented = parts
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if presented != Some(state.sweep_token.as_str()) {
        return unauthorized("sweep requires the scheduler bearer token");
    }

    let Some(kind) = SweepKind::parse(&kind) else {
        return PipelineError::NotFound(format!("unknown sweep kind '{kind}'")).into_response();
    };

    match state.sweeper.run(kind, Utc::now()) {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => err.into_response(),
    }
}
