use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use super::common::{
    candidate, employer, introduction, job, unsigned_employer, CANDIDATE, EMPLOYER,
    UNSIGNED_EMPLOYER,
};
use crate::pipeline::domain::IntroductionStatus;
use crate::pipeline::ledger::PaymentLedger;
use crate::pipeline::memory::{
    InMemoryNotificationPublisher, InMemoryPaymentGateway, InMemoryPipelineRepository,
};
use crate::pipeline::negotiation::AvailabilityNegotiator;
use crate::pipeline::router::{pipeline_router, PipelineState};
use crate::pipeline::service::PipelineService;
use crate::pipeline::sweeper::ExpirationSweeper;
use crate::pipeline::FeeConfig;

const SWEEP_TOKEN: &str = "test-sweep-token";

fn router() -> (Router, Arc<InMemoryPipelineRepository>) {
    let repository = Arc::new(InMemoryPipelineRepository::default());
    repository.put_candidate(candidate());
    repository.put_employer(employer());
    repository.put_employer(unsigned_employer());
    repository.put_job(job());
    repository.put_introduction(introduction());

    let notifier = Arc::new(InMemoryNotificationPublisher::default());
    let gateway = Arc::new(InMemoryPaymentGateway::default());
    let fees = FeeConfig::default();

    let state = Arc::new(PipelineState {
        service: PipelineService::new(repository.clone(), fees.clone()),
        negotiator: AvailabilityNegotiator::new(repository.clone()),
        sweeper: ExpirationSweeper::new(repository.clone(), notifier),
        ledger: PaymentLedger::new(repository.clone(), gateway, fees),
        repository: repository.clone(),
        sweep_token: SWEEP_TOKEN.to_string(),
    });

    (pipeline_router(state), repository)
}

fn post_json(uri: &str, actor: (&str, &str), body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-actor-id", actor.0)
        .header("x-actor-role", actor.1)
        .body(Body::from(serde_json::to_vec(&body).expect("body encodes")))
        .expect("request builds")
}

fn get_as(uri: &str, actor: (&str, &str)) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-actor-id", actor.0)
        .header("x-actor-role", actor.1)
        .body(Body::empty())
        .expect("request builds")
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

fn submission_body() -> Value {
    json!({ "candidate_id": CANDIDATE, "job_id": "job-100" })
}

#[tokio::test]
async fn submit_endpoint_creates_and_then_conflicts() {
    let (router, _repository) = router();

    let created = router
        .clone()
        .oneshot(post_json(
            "/api/v1/pipeline/applications",
            (CANDIDATE, "candidate"),
            submission_body(),
        ))
        .await
        .expect("request runs");
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload = body_json(created).await;
    assert_eq!(payload["entity"]["status"], "pending");
    assert_eq!(payload["notifications"][0]["template"], "application_received");

    let duplicate = router
        .oneshot(post_json(
            "/api/v1/pipeline/applications",
            (CANDIDATE, "candidate"),
            submission_body(),
        ))
        .await
        .expect("request runs");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_actor_headers_are_unauthorized() {
    let (router, _repository) = router();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/pipeline/applications")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&submission_body()).expect("body encodes"),
        ))
        .expect("request builds");

    let response = router.oneshot(request).await.expect("request runs");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn offer_lifecycle_round_trips_over_http() {
    let (router, _repository) = router();

    let created = router
        .clone()
        .oneshot(post_json(
            "/api/v1/pipeline/applications",
            (CANDIDATE, "candidate"),
            submission_body(),
        ))
        .await
        .expect("request runs");
    let application_id = body_json(created).await["entity"]["id"]
        .as_str()
        .expect("application id")
        .to_string();

    let reviewed = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/pipeline/applications/{application_id}/review"),
            (EMPLOYER, "employer"),
            json!({ "status": "shortlisted" }),
        ))
        .await
        .expect("request runs");
    assert_eq!(reviewed.status(), StatusCode::OK);

    let offered = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/pipeline/applications/{application_id}/offer"),
            (EMPLOYER, "employer"),
            json!({ "salary": 15_000_000, "start_date": "2026-04-01" }),
        ))
        .await
        .expect("request runs");
    assert_eq!(offered.status(), StatusCode::CREATED);
    let offer_id = body_json(offered).await["entity"]["id"]
        .as_str()
        .expect("offer id")
        .to_string();

    let responded = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/pipeline/offers/{offer_id}/respond"),
            (CANDIDATE, "candidate"),
            json!({ "decision": "accept" }),
        ))
        .await
        .expect("request runs");
    assert_eq!(responded.status(), StatusCode::OK);
    let payload = body_json(responded).await;
    assert_eq!(payload["entity"]["offer"]["status"], "accepted");
    assert_eq!(payload["entity"]["placement"]["fee_percentage"], 18);

    // A second accept over the wire conflicts rather than double-placing.
    let repeat = router
        .oneshot(post_json(
            &format!("/api/v1/pipeline/offers/{offer_id}/respond"),
            (CANDIDATE, "candidate"),
            json!({ "decision": "accept" }),
        ))
        .await
        .expect("request runs");
    assert_eq!(repeat.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn sweep_endpoint_requires_the_bearer_token() {
    let (router, _repository) = router();

    let denied = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/pipeline/sweep/offers")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request runs");
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/pipeline/sweep/offers")
                .header("authorization", format!("Bearer {SWEEP_TOKEN}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request runs");
    assert_eq!(allowed.status(), StatusCode::OK);
    let summary = body_json(allowed).await;
    assert_eq!(summary["kind"], "offers");
    assert_eq!(summary["errors"], json!([]));
}

#[tokio::test]
async fn unknown_sweep_kind_is_not_found() {
    let (router, _repository) = router();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/pipeline/sweep/everything")
                .header("authorization", format!("Bearer {SWEEP_TOKEN}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request runs");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_endpoint_applies_the_access_gate() {
    let (router, repository) = router();

    let gated = router
        .clone()
        .oneshot(get_as(
            &format!("/api/v1/pipeline/candidates/{CANDIDATE}/profile"),
            (UNSIGNED_EMPLOYER, "employer"),
        ))
        .await
        .expect("request runs");
    assert_eq!(gated.status(), StatusCode::OK);
    let view = body_json(gated).await;
    assert_eq!(view["access"], "no_agreement");
    assert!(view.get("email").is_none());
    assert!(view.get("skills").is_none());

    let mut intro = introduction();
    intro.status = IntroductionStatus::Introduced;
    repository.put_introduction(intro);

    let open = router
        .oneshot(get_as(
            &format!("/api/v1/pipeline/candidates/{CANDIDATE}/profile"),
            (EMPLOYER, "employer"),
        ))
        .await
        .expect("request runs");
    let view = body_json(open).await;
    assert_eq!(view["access"], "full_access");
    assert_eq!(view["email"], "ada@example.com");
}
