use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, AvailabilitySlot, Candidate, CandidateId, ClaimState, Employer,
    EmployerId, Interview, InterviewId, InterviewStatus, Introduction, Job, JobId, JobStatus,
    Offer, OfferId, OfferStatus, PaymentStatus, Placement, PlacementId, SlotId, SlotSelection,
};

/// Error enumeration for repository failures.
///
/// Conflict doubles as the compare-and-swap signal: a guarded transition
/// whose expectation no longer holds reports Conflict so the caller can
/// re-fetch instead of overwriting a concurrent move.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or state moved concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage seam for the pipeline. The production store is a transactional
/// relational database; every method maps to one transaction. Uniqueness
/// invariants (application per candidate+job, offer per application,
/// placement per offer, introduction per employer+candidate) are enforced
/// here, not just in callers.
///
/// `transition_*` methods are state-guarded writes: the update applies only
/// if the row still carries the expected status, otherwise Conflict.
pub trait PipelineRepository: Send + Sync {
    // applications
    fn insert_application(&self, application: Application) -> Result<Application, RepositoryError>;
    fn update_application(&self, application: Application) -> Result<(), RepositoryError>;
    fn transition_claim(
        &self,
        id: &ApplicationId,
        expected: &ClaimState,
        updated: Application,
    ) -> Result<(), RepositoryError>;
    fn fetch_application(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;
    fn find_application(
        &self,
        candidate_id: &CandidateId,
        job_id: &JobId,
    ) -> Result<Option<Application>, RepositoryError>;

    // jobs
    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    fn transition_job(
        &self,
        id: &JobId,
        expected: JobStatus,
        updated: Job,
    ) -> Result<(), RepositoryError>;
    fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError>;

    // interviews and slots
    fn insert_interview(
        &self,
        interview: Interview,
        slots: Vec<AvailabilitySlot>,
    ) -> Result<Interview, RepositoryError>;
    fn update_interview(&self, interview: Interview) -> Result<(), RepositoryError>;
    fn transition_interview(
        &self,
        id: &InterviewId,
        expected: InterviewStatus,
        updated: Interview,
    ) -> Result<(), RepositoryError>;
    fn fetch_interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError>;
    fn interviews_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<Interview>, RepositoryError>;
    fn interviews_with_status(
        &self,
        statuses: &[InterviewStatus],
    ) -> Result<Vec<Interview>, RepositoryError>;
    fn slots_for_interview(
        &self,
        id: &InterviewId,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError>;
    fn fetch_slot(&self, id: &SlotId) -> Result<Option<AvailabilitySlot>, RepositoryError>;
    /// Atomic delete-then-insert of the candidate's chosen subset.
    fn replace_slot_selections(
        &self,
        id: &InterviewId,
        selections: Vec<SlotSelection>,
    ) -> Result<(), RepositoryError>;
    fn selections_for_interview(
        &self,
        id: &InterviewId,
    ) -> Result<Vec<SlotSelection>, RepositoryError>;

    // offers
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError>;
    fn transition_offer(
        &self,
        id: &OfferId,
        expected: OfferStatus,
        updated: Offer,
    ) -> Result<(), RepositoryError>;
    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    fn offer_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Offer>, RepositoryError>;
    fn offers_with_status(&self, status: OfferStatus) -> Result<Vec<Offer>, RepositoryError>;

    // placements
    fn insert_placement(&self, placement: Placement) -> Result<Placement, RepositoryError>;
    fn transition_placement(
        &self,
        id: &PlacementId,
        expected: PaymentStatus,
        updated: Placement,
    ) -> Result<(), RepositoryError>;
    fn update_placement(&self, placement: Placement) -> Result<(), RepositoryError>;
    fn fetch_placement(&self, id: &PlacementId) -> Result<Option<Placement>, RepositoryError>;
    /// Placements with the upfront leg paid and the balance outstanding.
    fn placements_awaiting_balance(&self) -> Result<Vec<Placement>, RepositoryError>;

    // parties
    fn fetch_candidate(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError>;
    fn update_candidate(&self, candidate: Candidate) -> Result<(), RepositoryError>;
    fn fetch_employer(&self, id: &EmployerId) -> Result<Option<Employer>, RepositoryError>;
    fn update_employer(&self, employer: Employer) -> Result<(), RepositoryError>;
    fn fetch_introduction(
        &self,
        employer_id: &EmployerId,
        candidate_id: &CandidateId,
    ) -> Result<Option<Introduction>, RepositoryError>;
    fn update_introduction(&self, introduction: Introduction) -> Result<(), RepositoryError>;

    // payment intents
    fn upsert_intent_record(&self, record: PaymentIntentRecord) -> Result<(), RepositoryError>;
    fn fetch_intent_record(
        &self,
        placement_id: &PlacementId,
        leg: PaymentLeg,
    ) -> Result<Option<PaymentIntentRecord>, RepositoryError>;
}

/// Which staged leg of a placement fee an intent pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLeg {
    Upfront,
    Remaining,
}

impl PaymentLeg {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upfront => "upfront",
            Self::Remaining => "remaining",
        }
    }
}

/// Durable record of a gateway intent per (placement, leg).
///
/// The record (and its idempotency key) is written before the gateway call,
/// so a timed-out creation is retried against the same key instead of
/// minting a duplicate intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentRecord {
    pub placement_id: PlacementId,
    pub leg: PaymentLeg,
    pub idempotency_key: String,
    pub intent_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One message for the collaborator mailer to dispatch: who, which template,
/// and the template's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient: String,
    pub template: String,
    pub payload: BTreeMap<String, String>,
}

impl NotificationIntent {
    pub fn new(recipient: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            template: template.into(),
            payload: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Outbound dispatch seam used by the expiration sweeper. Command handlers
/// return intents to their caller instead; only scheduled passes push
/// directly.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, intent: NotificationIntent) -> Result<(), NotificationError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
