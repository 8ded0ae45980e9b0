use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorContext, Application, ApplicationId, ApplicationStatus, CandidateId, ClaimState,
    EmployerId, InterviewStatus, IntroductionStatus, JobId, JobStatus, Offer, OfferId,
    OfferStatus, PaymentStatus, Placement, PlacementId,
};
use super::error::PipelineError;
use super::fees::{calculate_fee, FeeConfig};
use super::repository::{NotificationIntent, PipelineRepository, RepositoryError};

/// Result of one pipeline command: the entity after the transition plus the
/// notification intents the collaborator mailer should dispatch. Dispatch
/// happens after the state change commits and never rolls it back.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome<T> {
    pub entity: T,
    pub notifications: Vec<NotificationIntent>,
}

impl<T> CommandOutcome<T> {
    pub(crate) fn quiet(entity: T) -> Self {
        Self {
            entity,
            notifications: Vec::new(),
        }
    }
}

/// Compensation terms attached to a fresh offer.
#[derive(Debug, Clone, Deserialize)]
pub struct OfferTerms {
    /// Annual salary in integer minor-currency units.
    pub salary: i64,
    pub start_date: NaiveDate,
    /// Defaults to now + the configured validity window.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Candidate's answer to a pending offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferDecision {
    Accept,
    Decline,
}

/// Offer after a response, with the placement when acceptance created one.
#[derive(Debug, Clone, Serialize)]
pub struct OfferResolution {
    pub offer: Offer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PLACEMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

fn next_offer_id() -> OfferId {
    let id = OFFER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OfferId(format!("offer-{id:06}"))
}

fn next_placement_id() -> PlacementId {
    let id = PLACEMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PlacementId(format!("pl-{id:06}"))
}

/// Advance an introduction along its forward progression, never backwards
/// and never out of an exit state. Missing introductions are fine; the pair
/// may have met outside the introduction flow.
pub(crate) fn advance_introduction<R: PipelineRepository>(
    repository: &R,
    employer_id: &EmployerId,
    candidate_id: &CandidateId,
    target: IntroductionStatus,
) -> Result<(), RepositoryError> {
    let Some(mut introduction) = repository.fetch_introduction(employer_id, candidate_id)? else {
        return Ok(());
    };
    let (Some(current), Some(goal)) = (introduction.status.stage_rank(), target.stage_rank())
    else {
        return Ok(());
    };
    if current < goal {
        introduction.status = target;
        repository.update_introduction(introduction)?;
    }
    Ok(())
}

/// The hiring-pipeline state machine: validates the current state, applies
/// the transition in one guarded write, and hands back notification
/// intents.
pub struct PipelineService<R> {
    repository: Arc<R>,
    fees: FeeConfig,
}

impl<R> PipelineService<R>
where
    R: PipelineRepository + 'static,
{
    pub fn new(repository: Arc<R>, fees: FeeConfig) -> Self {
        Self { repository, fees }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Submit a candidate's application to an active job.
    pub fn submit_application(
        &self,
        actor: &ActorContext,
        candidate_id: CandidateId,
        job_id: JobId,
        cover_letter: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Application>, PipelineError> {
        if !actor.acts_for_candidate(&candidate_id) {
            return Err(PipelineError::Forbidden(
                "only the candidate may submit their application".to_string(),
            ));
        }

        let candidate = self
            .repository
            .fetch_candidate(&candidate_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("candidate {}", candidate_id.0)))?;
        let job = self
            .repository
            .fetch_job(&job_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("job {}", job_id.0)))?;

        if job.status != JobStatus::Active {
            return Err(PipelineError::Conflict(format!(
                "job {} is not accepting applications ({})",
                job.id.0,
                job.status.label()
            )));
        }
        if let Some(deadline) = job.deadline {
            if now > deadline {
                return Err(PipelineError::Expired(format!(
                    "job {} closed to applications at {deadline}",
                    job.id.0
                )));
            }
        }
        if self
            .repository
            .find_application(&candidate_id, &job_id)?
            .is_some()
        {
            return Err(PipelineError::Conflict(format!(
                "candidate {} already applied to job {}",
                candidate_id.0, job_id.0
            )));
        }

        let application = Application {
            id: next_application_id(),
            candidate_id: candidate_id.clone(),
            job_id: job_id.clone(),
            status: ApplicationStatus::Pending,
            cover_letter,
            claim: ClaimState::Unclaimed,
            applied_at: now,
            reviewed_at: None,
        };
        // The unique (candidate, job) constraint backstops the pre-check.
        let stored = self.repository.insert_application(application)?;

        let notification = NotificationIntent::new(&job.employer_id.0, "application_received")
            .with("application_id", stored.id.0.clone())
            .with("job_id", job.id.0.clone())
            .with("candidate_name", candidate.full_name);

        Ok(CommandOutcome {
            entity: stored,
            notifications: vec![notification],
        })
    }

    /// Move an application forward along the review path.
    pub fn review_application(
        &self,
        actor: &ActorContext,
        application_id: &ApplicationId,
        new_status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Application>, PipelineError> {
        let mut application = self.require_application(application_id)?;
        let job = self.require_job(&application.job_id)?;
        if !actor.acts_for_employer(&job.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the hiring employer may review this application".to_string(),
            ));
        }

        if application.status.is_terminal() {
            return Err(PipelineError::Conflict(format!(
                "application {} is closed ({})",
                application.id.0,
                application.status.label()
            )));
        }
        if matches!(
            application.status,
            ApplicationStatus::Offered | ApplicationStatus::Accepted
        ) {
            return Err(PipelineError::Conflict(format!(
                "application {} is governed by its offer",
                application.id.0
            )));
        }
        let current_rank = application.status.progress_rank().unwrap_or_default();

        match new_status {
            ApplicationStatus::Rejected => {}
            ApplicationStatus::Reviewed
            | ApplicationStatus::Shortlisted
            | ApplicationStatus::InterviewScheduled
            | ApplicationStatus::Interviewed => {
                let target_rank = new_status.progress_rank().unwrap_or_default();
                if target_rank <= current_rank {
                    return Err(PipelineError::Validation(format!(
                        "cannot move application from {} back to {}",
                        application.status.label(),
                        new_status.label()
                    )));
                }
            }
            ApplicationStatus::Offered => {
                if self
                    .repository
                    .offer_for_application(&application.id)?
                    .is_none()
                {
                    return Err(PipelineError::Validation(
                        "cannot mark offered without an offer on file".to_string(),
                    ));
                }
            }
            ApplicationStatus::Pending
            | ApplicationStatus::Accepted
            | ApplicationStatus::Withdrawn => {
                return Err(PipelineError::Validation(format!(
                    "{} is not a review status",
                    new_status.label()
                )));
            }
        }

        application.status = new_status;
        if application.reviewed_at.is_none() {
            application.reviewed_at = Some(now);
        }
        self.repository.update_application(application.clone())?;

        let notification =
            NotificationIntent::new(&application.candidate_id.0, "application_status_changed")
                .with("application_id", application.id.0.clone())
                .with("job_title", job.title)
                .with("status", new_status.label());

        Ok(CommandOutcome {
            entity: application,
            notifications: vec![notification],
        })
    }

    /// Extend an offer against an application that has progressed far
    /// enough (shortlisted or interviewed, or a completed interview round).
    pub fn make_offer(
        &self,
        actor: &ActorContext,
        application_id: &ApplicationId,
        terms: OfferTerms,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Offer>, PipelineError> {
        let mut application = self.require_application(application_id)?;
        let job = self.require_job(&application.job_id)?;
        if !actor.acts_for_employer(&job.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the hiring employer may extend an offer".to_string(),
            ));
        }

        let eligible_by_status = matches!(
            application.status,
            ApplicationStatus::Shortlisted
                | ApplicationStatus::InterviewScheduled
                | ApplicationStatus::Interviewed
        );
        let eligible_by_interview = self
            .repository
            .interviews_for_application(&application.id)?
            .iter()
            .any(|interview| interview.status == InterviewStatus::Completed);
        if !eligible_by_status && !eligible_by_interview {
            return Err(PipelineError::Conflict(format!(
                "application {} is not ready for an offer ({})",
                application.id.0,
                application.status.label()
            )));
        }
        if self
            .repository
            .offer_for_application(&application.id)?
            .is_some()
        {
            return Err(PipelineError::Conflict(format!(
                "application {} already has an offer",
                application.id.0
            )));
        }

        if terms.salary < 0 {
            return Err(PipelineError::Validation(format!(
                "salary must be non-negative minor units, got {}",
                terms.salary
            )));
        }
        let expires_at = terms
            .expires_at
            .unwrap_or_else(|| now + Duration::days(self.fees.offer_validity_days));
        if expires_at <= now {
            return Err(PipelineError::Validation(
                "offer expiry must lie in the future".to_string(),
            ));
        }

        let offer = Offer {
            id: next_offer_id(),
            application_id: application.id.clone(),
            job_id: job.id.clone(),
            candidate_id: application.candidate_id.clone(),
            employer_id: job.employer_id.clone(),
            salary: terms.salary,
            start_date: terms.start_date,
            status: OfferStatus::Pending,
            expires_at,
            responded_at: None,
            response_note: None,
            created_at: now,
        };
        // Unique offer-per-application constraint backstops the pre-check.
        let stored = self.repository.insert_offer(offer)?;

        application.status = ApplicationStatus::Offered;
        self.repository.update_application(application.clone())?;
        advance_introduction(
            self.repository.as_ref(),
            &stored.employer_id,
            &stored.candidate_id,
            IntroductionStatus::OfferExtended,
        )?;

        let notification = NotificationIntent::new(&stored.candidate_id.0, "offer_extended")
            .with("offer_id", stored.id.0.clone())
            .with("job_title", job.title)
            .with("salary", stored.salary.to_string())
            .with("expires_at", stored.expires_at.to_rfc3339());

        Ok(CommandOutcome {
            entity: stored,
            notifications: vec![notification],
        })
    }

    /// Accept or decline a pending offer. Acceptance is the single point
    /// where a placement is created; the offer-status compare-and-swap
    /// guarantees exactly one winner under concurrent accepts.
    pub fn respond_to_offer(
        &self,
        actor: &ActorContext,
        offer_id: &OfferId,
        decision: OfferDecision,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<OfferResolution>, PipelineError> {
        let offer = self.require_offer(offer_id)?;
        if !actor.acts_for_candidate(&offer.candidate_id) {
            return Err(PipelineError::Forbidden(
                "only the offer's candidate may respond".to_string(),
            ));
        }
        if offer.status != OfferStatus::Pending {
            return Err(PipelineError::Conflict(format!(
                "offer {} was already resolved ({})",
                offer.id.0,
                offer.status.label()
            )));
        }

        if now > offer.expires_at {
            self.expire_offer(&offer)?;
            return Err(PipelineError::Expired(format!(
                "offer {} expired at {}",
                offer.id.0, offer.expires_at
            )));
        }

        match decision {
            OfferDecision::Accept => self.accept_offer(offer, note, now),
            OfferDecision::Decline => self.decline_offer(offer, note, now),
        }
    }

    /// Withdraw a pending offer and revert the application to interviewed.
    pub fn withdraw_offer(
        &self,
        actor: &ActorContext,
        offer_id: &OfferId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Offer>, PipelineError> {
        let offer = self.require_offer(offer_id)?;
        if !actor.acts_for_employer(&offer.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the issuing employer may withdraw an offer".to_string(),
            ));
        }
        if offer.status != OfferStatus::Pending {
            return Err(PipelineError::Conflict(format!(
                "offer {} was already resolved ({})",
                offer.id.0,
                offer.status.label()
            )));
        }

        let mut withdrawn = offer.clone();
        withdrawn.status = OfferStatus::Withdrawn;
        withdrawn.responded_at = Some(now);
        withdrawn.response_note = reason;
        self.repository
            .transition_offer(&offer.id, OfferStatus::Pending, withdrawn.clone())?;

        if let Some(mut application) = self.repository.fetch_application(&offer.application_id)? {
            application.status = ApplicationStatus::Interviewed;
            self.repository.update_application(application)?;
        }

        let notification = NotificationIntent::new(&withdrawn.candidate_id.0, "offer_withdrawn")
            .with("offer_id", withdrawn.id.0.clone());

        Ok(CommandOutcome {
            entity: withdrawn,
            notifications: vec![notification],
        })
    }

    /// Take the administrative claim on an application. Claimed and
    /// converted applications cannot be claimed again.
    pub fn claim_application(
        &self,
        actor: &ActorContext,
        application_id: &ApplicationId,
    ) -> Result<CommandOutcome<Application>, PipelineError> {
        if !actor.is_admin() {
            return Err(PipelineError::Forbidden(
                "claims are an administrator action".to_string(),
            ));
        }
        let mut application = self.require_application(application_id)?;
        match &application.claim {
            ClaimState::Unclaimed => {}
            ClaimState::Claimed { admin_id } => {
                return Err(PipelineError::Conflict(format!(
                    "application {} is already claimed by {}",
                    application.id.0, admin_id.0
                )));
            }
            ClaimState::Converted => {
                return Err(PipelineError::Conflict(format!(
                    "application {} was converted and can no longer be claimed",
                    application.id.0
                )));
            }
        }

        application.claim = ClaimState::Claimed {
            admin_id: super::domain::AdminId(actor.actor_id.clone()),
        };
        // CAS on the claim state settles concurrent claim races.
        self.repository.transition_claim(
            &application.id,
            &ClaimState::Unclaimed,
            application.clone(),
        )?;

        Ok(CommandOutcome::quiet(application))
    }

    /// Release a claim previously taken by this administrator.
    pub fn release_claim(
        &self,
        actor: &ActorContext,
        application_id: &ApplicationId,
    ) -> Result<CommandOutcome<Application>, PipelineError> {
        if !actor.is_admin() {
            return Err(PipelineError::Forbidden(
                "claims are an administrator action".to_string(),
            ));
        }
        let mut application = self.require_application(application_id)?;
        let expected = application.claim.clone();
        match &expected {
            ClaimState::Claimed { admin_id } if admin_id.0 == actor.actor_id => {}
            ClaimState::Claimed { .. } => {
                return Err(PipelineError::Forbidden(
                    "only the claiming administrator may release".to_string(),
                ));
            }
            ClaimState::Unclaimed | ClaimState::Converted => {
                return Err(PipelineError::Conflict(format!(
                    "application {} holds no releasable claim",
                    application.id.0
                )));
            }
        }

        application.claim = ClaimState::Unclaimed;
        self.repository
            .transition_claim(&application.id, &expected, application.clone())?;

        Ok(CommandOutcome::quiet(application))
    }

    fn accept_offer(
        &self,
        offer: Offer,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<OfferResolution>, PipelineError> {
        let mut application = self.require_application(&offer.application_id)?;
        let candidate = self
            .repository
            .fetch_candidate(&offer.candidate_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("candidate {}", offer.candidate_id.0)))?;

        let breakdown = calculate_fee(offer.salary, candidate.experience_level, &self.fees)?;

        let mut accepted = offer.clone();
        accepted.status = OfferStatus::Accepted;
        accepted.responded_at = Some(now);
        accepted.response_note = note;
        // Serialization point: exactly one concurrent accept passes this CAS.
        self.repository
            .transition_offer(&offer.id, OfferStatus::Pending, accepted.clone())
            .map_err(|err| match err {
                RepositoryError::Conflict => PipelineError::Conflict(format!(
                    "offer {} was resolved concurrently",
                    offer.id.0
                )),
                other => PipelineError::Repository(other),
            })?;

        let placement = Placement {
            id: next_placement_id(),
            offer_id: accepted.id.clone(),
            application_id: application.id.clone(),
            job_id: accepted.job_id.clone(),
            candidate_id: accepted.candidate_id.clone(),
            employer_id: accepted.employer_id.clone(),
            salary: accepted.salary,
            fee_percentage: breakdown.fee_percentage,
            placement_fee: breakdown.placement_fee,
            upfront_amount: breakdown.upfront_amount,
            remaining_amount: breakdown.remaining_amount,
            start_date: accepted.start_date,
            guarantee_end_date: accepted.start_date
                + Duration::days(self.fees.guarantee_period_days),
            payment_status: PaymentStatus::Pending,
            upfront_paid_at: None,
            remaining_paid_at: None,
            upfront_transaction: None,
            remaining_transaction: None,
            payment_reminder: None,
            created_at: now,
        };
        // Unique placement-per-offer constraint backstops the CAS above.
        let placement = self.repository.insert_placement(placement)?;

        application.status = ApplicationStatus::Accepted;
        application.claim = ClaimState::Converted;
        self.repository.update_application(application)?;

        if let Some(job) = self.repository.fetch_job(&accepted.job_id)? {
            if job.status == JobStatus::Active {
                let mut filled = job.clone();
                filled.status = JobStatus::Filled;
                // Best effort; a concurrent expiry sweep may win the race.
                if let Err(RepositoryError::Conflict) =
                    self.repository
                        .transition_job(&job.id, JobStatus::Active, filled)
                {
                    tracing::debug!(job = %job.id.0, "job moved during placement, leaving as-is");
                }
            }
        }

        let mut hired_candidate = candidate;
        hired_candidate.available = false;
        self.repository.update_candidate(hired_candidate)?;

        advance_introduction(
            self.repository.as_ref(),
            &accepted.employer_id,
            &accepted.candidate_id,
            IntroductionStatus::Hired,
        )?;

        let notifications = vec![
            NotificationIntent::new(&accepted.employer_id.0, "offer_accepted")
                .with("offer_id", accepted.id.0.clone())
                .with("placement_id", placement.id.0.clone())
                .with("placement_fee", placement.placement_fee.to_string())
                .with("upfront_amount", placement.upfront_amount.to_string()),
            NotificationIntent::new(&accepted.candidate_id.0, "placement_confirmed")
                .with("placement_id", placement.id.0.clone())
                .with("start_date", placement.start_date.to_string()),
        ];

        Ok(CommandOutcome {
            entity: OfferResolution {
                offer: accepted,
                placement: Some(placement),
            },
            notifications,
        })
    }

    fn decline_offer(
        &self,
        offer: Offer,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<OfferResolution>, PipelineError> {
        let mut declined = offer.clone();
        declined.status = OfferStatus::Declined;
        declined.responded_at = Some(now);
        declined.response_note = note;
        self.repository
            .transition_offer(&offer.id, OfferStatus::Pending, declined.clone())?;

        if let Some(mut application) = self.repository.fetch_application(&offer.application_id)? {
            application.status = ApplicationStatus::Rejected;
            self.repository.update_application(application)?;
        }

        let notification = NotificationIntent::new(&declined.employer_id.0, "offer_declined")
            .with("offer_id", declined.id.0.clone());

        Ok(CommandOutcome {
            entity: OfferResolution {
                offer: declined,
                placement: None,
            },
            notifications: vec![notification],
        })
    }

    /// Corrective transition applied when a response arrives past the
    /// expiry: the offer goes to expired and the application to rejected.
    fn expire_offer(&self, offer: &Offer) -> Result<(), PipelineError> {
        let mut expired = offer.clone();
        expired.status = OfferStatus::Expired;
        self.repository
            .transition_offer(&offer.id, OfferStatus::Pending, expired)?;
        if let Some(mut application) = self.repository.fetch_application(&offer.application_id)? {
            application.status = ApplicationStatus::Rejected;
            self.repository.update_application(application)?;
        }
        Ok(())
    }

    fn require_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Application, PipelineError> {
        self.repository
            .fetch_application(id)?
            .ok_or_else(|| PipelineError::NotFound(format!("application {}", id.0)))
    }

    fn require_job(&self, id: &JobId) -> Result<super::domain::Job, PipelineError> {
        self.repository
            .fetch_job(id)?
            .ok_or_else(|| PipelineError::NotFound(format!("job {}", id.0)))
    }

    fn require_offer(&self, id: &OfferId) -> Result<Offer, PipelineError> {
        self.repository
            .fetch_offer(id)?
            .ok_or_else(|| PipelineError::NotFound(format!("offer {}", id.0)))
    }
}
