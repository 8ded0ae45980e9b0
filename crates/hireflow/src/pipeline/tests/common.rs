use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::pipeline::domain::{
    ActorContext, Application, ApplicationStatus, Candidate, CandidateId, Employer, EmployerId,
    ExperienceLevel, Interview, Introduction, IntroductionStatus, Job, JobId, JobStatus, Offer,
    SlotId,
};
use crate::pipeline::ledger::PaymentLedger;
use crate::pipeline::memory::{
    InMemoryNotificationPublisher, InMemoryPaymentGateway, InMemoryPipelineRepository,
};
use crate::pipeline::negotiation::{AvailabilityNegotiator, SlotWindow};
use crate::pipeline::repository::{
    NotificationError, NotificationIntent, NotificationPublisher, PipelineRepository,
};
use crate::pipeline::service::{OfferDecision, OfferTerms, PipelineService};
use crate::pipeline::sweeper::ExpirationSweeper;
use crate::pipeline::FeeConfig;

pub(super) const CANDIDATE: &str = "cand-100";
pub(super) const EMPLOYER: &str = "emp-100";
pub(super) const UNSIGNED_EMPLOYER: &str = "emp-200";
pub(super) const JOB: &str = "job-100";
pub(super) const SALARY_MINOR: i64 = 15_000_000;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid timestamp")
}

pub(super) fn candidate_actor() -> ActorContext {
    ActorContext::candidate(CANDIDATE)
}

pub(super) fn employer_actor() -> ActorContext {
    ActorContext::employer(EMPLOYER)
}

pub(super) fn admin_actor() -> ActorContext {
    ActorContext::admin("admin-1")
}

pub(super) fn candidate() -> Candidate {
    Candidate {
        id: CandidateId(CANDIDATE.to_string()),
        full_name: "Ada Wexford".to_string(),
        headline: "Staff platform engineer".to_string(),
        bio: "Twelve years building payment infrastructure.".to_string(),
        skills: vec!["rust".to_string(), "postgres".to_string()],
        experience_level: ExperienceLevel::Senior,
        email: "ada@example.com".to_string(),
        phone: Some("+1 515 555 0135".to_string()),
        links: vec!["https://example.com/ada".to_string()],
        resume_url: Some("s3://profiles/ada/resume.pdf".to_string()),
        available: true,
    }
}

pub(super) fn employer() -> Employer {
    Employer {
        id: EmployerId(EMPLOYER.to_string()),
        company_name: "Corvid Analytics".to_string(),
        agreement_signed_at: Some(now() - Duration::days(30)),
        total_spent: 0,
        gateway_customer: None,
    }
}

pub(super) fn unsigned_employer() -> Employer {
    Employer {
        id: EmployerId(UNSIGNED_EMPLOYER.to_string()),
        company_name: "Hollow Pine Labs".to_string(),
        agreement_signed_at: None,
        total_spent: 0,
        gateway_customer: None,
    }
}

pub(super) fn job() -> Job {
    Job {
        id: JobId(JOB.to_string()),
        employer_id: EmployerId(EMPLOYER.to_string()),
        title: "Senior Platform Engineer".to_string(),
        status: JobStatus::Active,
        deadline: Some(now() + Duration::days(14)),
        created_at: now() - Duration::days(7),
    }
}

pub(super) fn introduction() -> Introduction {
    Introduction {
        employer_id: EmployerId(EMPLOYER.to_string()),
        candidate_id: CandidateId(CANDIDATE.to_string()),
        status: IntroductionStatus::IntroRequested,
        candidate_response: None,
        created_at: now() - Duration::days(10),
    }
}

pub(super) struct Harness {
    pub service: PipelineService<InMemoryPipelineRepository>,
    pub negotiator: AvailabilityNegotiator<InMemoryPipelineRepository>,
    pub sweeper: ExpirationSweeper<InMemoryPipelineRepository, InMemoryNotificationPublisher>,
    pub ledger: PaymentLedger<InMemoryPipelineRepository, InMemoryPaymentGateway>,
    pub repository: Arc<InMemoryPipelineRepository>,
    pub notifier: Arc<InMemoryNotificationPublisher>,
    pub gateway: Arc<InMemoryPaymentGateway>,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryPipelineRepository::default());
    repository.put_candidate(candidate());
    repository.put_employer(employer());
    repository.put_employer(unsigned_employer());
    repository.put_job(job());
    repository.put_introduction(introduction());

    let notifier = Arc::new(InMemoryNotificationPublisher::default());
    let gateway = Arc::new(InMemoryPaymentGateway::default());
    let fees = FeeConfig::default();

    Harness {
        service: PipelineService::new(repository.clone(), fees.clone()),
        negotiator: AvailabilityNegotiator::new(repository.clone()),
        sweeper: ExpirationSweeper::new(repository.clone(), notifier.clone()),
        ledger: PaymentLedger::new(repository.clone(), gateway.clone(), fees),
        repository,
        notifier,
        gateway,
    }
}

pub(super) fn submit(harness: &Harness) -> Application {
    harness
        .service
        .submit_application(
            &candidate_actor(),
            CandidateId(CANDIDATE.to_string()),
            JobId(JOB.to_string()),
            Some("I would like to apply.".to_string()),
            now(),
        )
        .expect("submission succeeds")
        .entity
}

pub(super) fn shortlist(harness: &Harness, application: &Application) {
    harness
        .service
        .review_application(
            &employer_actor(),
            &application.id,
            ApplicationStatus::Shortlisted,
            now(),
        )
        .expect("shortlist succeeds");
}

pub(super) fn offer_terms() -> OfferTerms {
    OfferTerms {
        salary: SALARY_MINOR,
        start_date: (now() + Duration::days(30)).date_naive(),
        expires_at: Some(now() + Duration::days(7)),
    }
}

pub(super) fn make_offer(harness: &Harness, application: &Application) -> Offer {
    harness
        .service
        .make_offer(&employer_actor(), &application.id, offer_terms(), now())
        .expect("offer succeeds")
        .entity
}

/// Submit, shortlist, and extend the standard offer in one go.
pub(super) fn submitted_offer(harness: &Harness) -> (Application, Offer) {
    let application = submit(harness);
    shortlist(harness, &application);
    let offer = make_offer(harness, &application);
    (application, offer)
}

pub(super) fn accept_offer(harness: &Harness, offer: &Offer) -> crate::pipeline::Placement {
    harness
        .service
        .respond_to_offer(&candidate_actor(), &offer.id, OfferDecision::Accept, None, now())
        .expect("acceptance succeeds")
        .entity
        .placement
        .expect("placement created")
}

pub(super) fn windows() -> Vec<SlotWindow> {
    vec![
        SlotWindow {
            start_time: now() + Duration::days(2),
            end_time: now() + Duration::days(2) + Duration::hours(1),
        },
        SlotWindow {
            start_time: now() + Duration::days(3),
            end_time: now() + Duration::days(3) + Duration::hours(1),
        },
        SlotWindow {
            start_time: now() + Duration::days(4),
            end_time: now() + Duration::days(4) + Duration::hours(1),
        },
    ]
}

/// Walk the negotiation to a scheduled interview and return it with the
/// confirmed slot.
pub(super) fn scheduled_interview(
    harness: &Harness,
    application: &Application,
) -> (Interview, SlotId) {
    let interview = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds")
        .entity;
    let slots = harness
        .repository
        .slots_for_interview(&interview.id)
        .expect("slots load");
    let chosen: Vec<SlotId> = slots.iter().take(2).map(|slot| slot.id.clone()).collect();
    harness
        .negotiator
        .select_slots(&candidate_actor(), &interview.id, chosen.clone())
        .expect("selection succeeds");
    let confirmed = harness
        .negotiator
        .confirm_slot(
            &employer_actor(),
            &interview.id,
            &chosen[0],
            Some("https://meet.example.com/abc".to_string()),
            now(),
        )
        .expect("confirmation succeeds")
        .entity;
    (confirmed, chosen[0].clone())
}

/// Publisher whose transport always fails, for error-collection tests.
#[derive(Default)]
pub(super) struct FailingPublisher;

impl NotificationPublisher for FailingPublisher {
    fn publish(&self, _intent: NotificationIntent) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay down".to_string()))
    }
}
