use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use hireflow::pipeline::{
    AvailabilityNegotiator, Candidate, CandidateId, Employer, EmployerId, ExpirationSweeper,
    ExperienceLevel, FeeConfig, InMemoryNotificationPublisher, InMemoryPaymentGateway,
    InMemoryPipelineRepository, Introduction, IntroductionStatus, Job, JobId, JobStatus,
    PaymentLedger, PipelineService, PipelineState,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ApiPipelineState = PipelineState<
    InMemoryPipelineRepository,
    InMemoryNotificationPublisher,
    InMemoryPaymentGateway,
>;

/// Wire the pipeline services over the in-memory adapters. The relational
/// store and real mailer/gateway slot in behind the same traits in
/// production deployments.
pub(crate) fn build_pipeline_state(
    fees: FeeConfig,
    sweep_token: String,
) -> (Arc<ApiPipelineState>, Arc<InMemoryPipelineRepository>) {
    let repository = Arc::new(InMemoryPipelineRepository::default());
    let notifier = Arc::new(InMemoryNotificationPublisher::default());
    let gateway = Arc::new(InMemoryPaymentGateway::default());

    let state = Arc::new(PipelineState {
        service: PipelineService::new(repository.clone(), fees.clone()),
        negotiator: AvailabilityNegotiator::new(repository.clone()),
        sweeper: ExpirationSweeper::new(repository.clone(), notifier),
        ledger: PaymentLedger::new(repository.clone(), gateway, fees),
        repository: repository.clone(),
        sweep_token,
    });

    (state, repository)
}

/// Seed the reference entities collaborators would normally own, so local
/// runs and the demo have a working pipeline out of the box.
pub(crate) fn seed_reference_data(repository: &InMemoryPipelineRepository) {
    let now = Utc::now();

    repository.put_candidate(Candidate {
        id: CandidateId("cand-1".to_string()),
        full_name: "Noor Haddad".to_string(),
        headline: "Senior distributed-systems engineer".to_string(),
        bio: "Ten years across storage engines and billing platforms.".to_string(),
        skills: vec![
            "rust".to_string(),
            "postgres".to_string(),
            "kafka".to_string(),
        ],
        experience_level: ExperienceLevel::Senior,
        email: "noor@example.com".to_string(),
        phone: Some("+1 515 555 0188".to_string()),
        links: vec!["https://example.com/noor".to_string()],
        resume_url: Some("s3://profiles/noor/resume.pdf".to_string()),
        available: true,
    });

    repository.put_employer(Employer {
        id: EmployerId("emp-1".to_string()),
        company_name: "Brightsmith Robotics".to_string(),
        agreement_signed_at: Some(now - Duration::days(45)),
        total_spent: 0,
        gateway_customer: None,
    });

    repository.put_job(Job {
        id: JobId("job-1".to_string()),
        employer_id: EmployerId("emp-1".to_string()),
        title: "Senior Platform Engineer".to_string(),
        status: JobStatus::Active,
        deadline: Some(now + Duration::days(30)),
        created_at: now,
    });

    repository.put_introduction(Introduction {
        employer_id: EmployerId("emp-1".to_string()),
        candidate_id: CandidateId("cand-1".to_string()),
        status: IntroductionStatus::Introduced,
        candidate_response: None,
        created_at: now - Duration::days(14),
    });
}
