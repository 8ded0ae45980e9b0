//! In-memory adapters for the repository, notification, and gateway seams.
//!
//! A single mutex over the whole store gives every method the one-commit
//! atomicity the production relational store provides per transaction,
//! which is what makes the compare-and-swap transitions trustworthy here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::domain::{
    Application, ApplicationId, AvailabilitySlot, Candidate, CandidateId, ClaimState, Employer,
    EmployerId, Interview, InterviewId, InterviewStatus, Introduction, Job, JobId, JobStatus,
    Offer, OfferId, OfferStatus, PaymentStatus, Placement, PlacementId, SlotId, SlotSelection,
};
use super::ledger::{
    CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent,
};
use super::repository::{
    NotificationError, NotificationIntent, NotificationPublisher, PaymentIntentRecord,
    PaymentLeg, PipelineRepository, RepositoryError,
};

#[derive(Default)]
struct Store {
    applications: HashMap<ApplicationId, Application>,
    application_pairs: HashMap<(CandidateId, JobId), ApplicationId>,
    jobs: HashMap<JobId, Job>,
    candidates: HashMap<CandidateId, Candidate>,
    employers: HashMap<EmployerId, Employer>,
    interviews: HashMap<InterviewId, Interview>,
    slots: HashMap<SlotId, AvailabilitySlot>,
    selections: HashMap<InterviewId, Vec<SlotSelection>>,
    offers: HashMap<OfferId, Offer>,
    offer_by_application: HashMap<ApplicationId, OfferId>,
    placements: HashMap<PlacementId, Placement>,
    placement_by_offer: HashMap<OfferId, PlacementId>,
    introductions: HashMap<(EmployerId, CandidateId), Introduction>,
    intent_records: HashMap<(PlacementId, PaymentLeg), PaymentIntentRecord>,
}

/// Mutex-guarded map store implementing the full pipeline repository.
#[derive(Default, Clone)]
pub struct InMemoryPipelineRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryPipelineRepository {
    fn locked<T>(&self, body: impl FnOnce(&mut Store) -> T) -> T {
        let mut guard = self.store.lock().expect("pipeline store mutex poisoned");
        body(&mut guard)
    }

    // Reference entities are owned by collaborators; seeding stands in for
    // their write paths in demos and tests.
    pub fn put_candidate(&self, candidate: Candidate) {
        self.locked(|store| {
            store.candidates.insert(candidate.id.clone(), candidate);
        });
    }

    pub fn put_employer(&self, employer: Employer) {
        self.locked(|store| {
            store.employers.insert(employer.id.clone(), employer);
        });
    }

    pub fn put_job(&self, job: Job) {
        self.locked(|store| {
            store.jobs.insert(job.id.clone(), job);
        });
    }

    pub fn put_introduction(&self, introduction: Introduction) {
        self.locked(|store| {
            store.introductions.insert(
                (
                    introduction.employer_id.clone(),
                    introduction.candidate_id.clone(),
                ),
                introduction,
            );
        });
    }
}

impl PipelineRepository for InMemoryPipelineRepository {
    fn insert_application(&self, application: Application) -> Result<Application, RepositoryError> {
        self.locked(|store| {
            let pair = (
                application.candidate_id.clone(),
                application.job_id.clone(),
            );
            if store.application_pairs.contains_key(&pair)
                || store.applications.contains_key(&application.id)
            {
                return Err(RepositoryError::Conflict);
            }
            store.application_pairs.insert(pair, application.id.clone());
            store
                .applications
                .insert(application.id.clone(), application.clone());
            Ok(application)
        })
    }

    fn update_application(&self, application: Application) -> Result<(), RepositoryError> {
        self.locked(|store| {
            if !store.applications.contains_key(&application.id) {
                return Err(RepositoryError::NotFound);
            }
            store
                .applications
                .insert(application.id.clone(), application);
            Ok(())
        })
    }

    fn transition_claim(
        &self,
        id: &ApplicationId,
        expected: &ClaimState,
        updated: Application,
    ) -> Result<(), RepositoryError> {
        self.locked(|store| {
            let current = store.applications.get(id).ok_or(RepositoryError::NotFound)?;
            if &current.claim != expected {
                return Err(RepositoryError::Conflict);
            }
            store.applications.insert(id.clone(), updated);
            Ok(())
        })
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.locked(|store| Ok(store.applications.get(id).cloned()))
    }

    fn find_application(
        &self,
        candidate_id: &CandidateId,
        job_id: &JobId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.locked(|store| {
            let id = store
                .application_pairs
                .get(&(candidate_id.clone(), job_id.clone()));
            Ok(id.and_then(|id| store.applications.get(id)).cloned())
        })
    }

    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        self.locked(|store| Ok(store.jobs.get(id).cloned()))
    }

    fn transition_job(
        &self,
        id: &JobId,
        expected: JobStatus,
        updated: Job,
    ) -> Result<(), RepositoryError> {
        self.locked(|store| {
            let current = store.jobs.get(id).ok_or(RepositoryError::NotFound)?;
            if current.status != expected {
                return Err(RepositoryError::Conflict);
            }
            store.jobs.insert(id.clone(), updated);
            Ok(())
        })
    }

    fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .jobs
                .values()
                .filter(|job| job.status == status)
                .cloned()
                .collect())
        })
    }

    fn insert_interview(
        &self,
        interview: Interview,
        slots: Vec<AvailabilitySlot>,
    ) -> Result<Interview, RepositoryError> {
        self.locked(|store| {
            if store.interviews.contains_key(&interview.id) {
                return Err(RepositoryError::Conflict);
            }
            for slot in slots {
                store.slots.insert(slot.id.clone(), slot);
            }
            store
                .interviews
                .insert(interview.id.clone(), interview.clone());
            Ok(interview)
        })
    }

    fn update_interview(&self, interview: Interview) -> Result<(), RepositoryError> {
        self.locked(|store| {
            if !store.interviews.contains_key(&interview.id) {
                return Err(RepositoryError::NotFound);
            }
            store.interviews.insert(interview.id.clone(), interview);
            Ok(())
        })
    }

    fn transition_interview(
        &self,
        id: &InterviewId,
        expected: InterviewStatus,
        updated: Interview,
    ) -> Result<(), RepositoryError> {
        self.locked(|store| {
            let current = store.interviews.get(id).ok_or(RepositoryError::NotFound)?;
            if current.status != expected {
                return Err(RepositoryError::Conflict);
            }
            store.interviews.insert(id.clone(), updated);
            Ok(())
        })
    }

    fn fetch_interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError> {
        self.locked(|store| Ok(store.interviews.get(id).cloned()))
    }

    fn interviews_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<Interview>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .interviews
                .values()
                .filter(|interview| &interview.application_id == id)
                .cloned()
                .collect())
        })
    }

    fn interviews_with_status(
        &self,
        statuses: &[InterviewStatus],
    ) -> Result<Vec<Interview>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .interviews
                .values()
                .filter(|interview| statuses.contains(&interview.status))
                .cloned()
                .collect())
        })
    }

    fn slots_for_interview(
        &self,
        id: &InterviewId,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError> {
        self.locked(|store| {
            let mut slots: Vec<AvailabilitySlot> = store
                .slots
                .values()
                .filter(|slot| &slot.interview_id == id)
                .cloned()
                .collect();
            slots.sort_by_key(|slot| slot.start_time);
            Ok(slots)
        })
    }

    fn fetch_slot(&self, id: &SlotId) -> Result<Option<AvailabilitySlot>, RepositoryError> {
        self.locked(|store| Ok(store.slots.get(id).cloned()))
    }

    fn replace_slot_selections(
        &self,
        id: &InterviewId,
        selections: Vec<SlotSelection>,
    ) -> Result<(), RepositoryError> {
        self.locked(|store| {
            store.selections.insert(id.clone(), selections);
            Ok(())
        })
    }

    fn selections_for_interview(
        &self,
        id: &InterviewId,
    ) -> Result<Vec<SlotSelection>, RepositoryError> {
        self.locked(|store| Ok(store.selections.get(id).cloned().unwrap_or_default()))
    }

    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError> {
        self.locked(|store| {
            if store
                .offer_by_application
                .contains_key(&offer.application_id)
                || store.offers.contains_key(&offer.id)
            {
                return Err(RepositoryError::Conflict);
            }
            store
                .offer_by_application
                .insert(offer.application_id.clone(), offer.id.clone());
            store.offers.insert(offer.id.clone(), offer.clone());
            Ok(offer)
        })
    }

    fn transition_offer(
        &self,
        id: &OfferId,
        expected: OfferStatus,
        updated: Offer,
    ) -> Result<(), RepositoryError> {
        self.locked(|store| {
            let current = store.offers.get(id).ok_or(RepositoryError::NotFound)?;
            if current.status != expected {
                return Err(RepositoryError::Conflict);
            }
            store.offers.insert(id.clone(), updated);
            Ok(())
        })
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        self.locked(|store| Ok(store.offers.get(id).cloned()))
    }

    fn offer_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Offer>, RepositoryError> {
        self.locked(|store| {
            let offer_id = store.offer_by_application.get(id);
            Ok(offer_id.and_then(|offer_id| store.offers.get(offer_id)).cloned())
        })
    }

    fn offers_with_status(&self, status: OfferStatus) -> Result<Vec<Offer>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .offers
                .values()
                .filter(|offer| offer.status == status)
                .cloned()
                .collect())
        })
    }

    fn insert_placement(&self, placement: Placement) -> Result<Placement, RepositoryError> {
        self.locked(|store| {
            if store.placement_by_offer.contains_key(&placement.offer_id)
                || store.placements.contains_key(&placement.id)
            {
                return Err(RepositoryError::Conflict);
            }
            store
                .placement_by_offer
                .insert(placement.offer_id.clone(), placement.id.clone());
            store
                .placements
                .insert(placement.id.clone(), placement.clone());
            Ok(placement)
        })
    }

    fn transition_placement(
        &self,
        id: &PlacementId,
        expected: PaymentStatus,
        updated: Placement,
    ) -> Result<(), RepositoryError> {
        self.locked(|store| {
            let current = store.placements.get(id).ok_or(RepositoryError::NotFound)?;
            if current.payment_status != expected {
                return Err(RepositoryError::Conflict);
            }
            store.placements.insert(id.clone(), updated);
            Ok(())
        })
    }

    fn update_placement(&self, placement: Placement) -> Result<(), RepositoryError> {
        self.locked(|store| {
            if !store.placements.contains_key(&placement.id) {
                return Err(RepositoryError::NotFound);
            }
            store.placements.insert(placement.id.clone(), placement);
            Ok(())
        })
    }

    fn fetch_placement(&self, id: &PlacementId) -> Result<Option<Placement>, RepositoryError> {
        self.locked(|store| Ok(store.placements.get(id).cloned()))
    }

    fn placements_awaiting_balance(&self) -> Result<Vec<Placement>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .placements
                .values()
                .filter(|placement| {
                    placement.upfront_paid_at.is_some() && placement.remaining_paid_at.is_none()
                })
                .cloned()
                .collect())
        })
    }

    fn fetch_candidate(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        self.locked(|store| Ok(store.candidates.get(id).cloned()))
    }

    fn update_candidate(&self, candidate: Candidate) -> Result<(), RepositoryError> {
        self.locked(|store| {
            if !store.candidates.contains_key(&candidate.id) {
                return Err(RepositoryError::NotFound);
            }
            store.candidates.insert(candidate.id.clone(), candidate);
            Ok(())
        })
    }

    fn fetch_employer(&self, id: &EmployerId) -> Result<Option<Employer>, RepositoryError> {
        self.locked(|store| Ok(store.employers.get(id).cloned()))
    }

    fn update_employer(&self, employer: Employer) -> Result<(), RepositoryError> {
        self.locked(|store| {
            if !store.employers.contains_key(&employer.id) {
                return Err(RepositoryError::NotFound);
            }
            store.employers.insert(employer.id.clone(), employer);
            Ok(())
        })
    }

    fn fetch_introduction(
        &self,
        employer_id: &EmployerId,
        candidate_id: &CandidateId,
    ) -> Result<Option<Introduction>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .introductions
                .get(&(employer_id.clone(), candidate_id.clone()))
                .cloned())
        })
    }

    fn update_introduction(&self, introduction: Introduction) -> Result<(), RepositoryError> {
        self.locked(|store| {
            let key = (
                introduction.employer_id.clone(),
                introduction.candidate_id.clone(),
            );
            if !store.introductions.contains_key(&key) {
                return Err(RepositoryError::NotFound);
            }
            store.introductions.insert(key, introduction);
            Ok(())
        })
    }

    fn upsert_intent_record(&self, record: PaymentIntentRecord) -> Result<(), RepositoryError> {
        self.locked(|store| {
            store
                .intent_records
                .insert((record.placement_id.clone(), record.leg), record);
            Ok(())
        })
    }

    fn fetch_intent_record(
        &self,
        placement_id: &PlacementId,
        leg: PaymentLeg,
    ) -> Result<Option<PaymentIntentRecord>, RepositoryError> {
        self.locked(|store| {
            Ok(store
                .intent_records
                .get(&(placement_id.clone(), leg))
                .cloned())
        })
    }
}

/// Publisher that records every intent, for demos and assertions.
#[derive(Default, Clone)]
pub struct InMemoryNotificationPublisher {
    events: Arc<Mutex<Vec<NotificationIntent>>>,
}

impl InMemoryNotificationPublisher {
    pub fn events(&self) -> Vec<NotificationIntent> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationPublisher for InMemoryNotificationPublisher {
    fn publish(&self, intent: NotificationIntent) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(intent);
        Ok(())
    }
}

/// Scriptable in-memory gateway: mints deterministic intents, can be told
/// to fail the next call, and lets callers settle intents to drive
/// reconciliation flows.
#[derive(Default)]
pub struct InMemoryPaymentGateway {
    sequence: AtomicU64,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    intent_by_key: Mutex<HashMap<String, String>>,
    seen_keys: Mutex<Vec<String>>,
    next_failure: Mutex<Option<GatewayError>>,
}

impl InMemoryPaymentGateway {
    /// Queue a failure for the next gateway call.
    pub fn fail_next(&self, error: GatewayError) {
        *self.next_failure.lock().expect("gateway mutex poisoned") = Some(error);
    }

    /// Mark an intent as succeeded, as the gateway would after payment.
    pub fn settle_intent(&self, id: &str) {
        let mut intents = self.intents.lock().expect("gateway mutex poisoned");
        if let Some(intent) = intents.get_mut(id) {
            intent.status = IntentStatus::Succeeded;
        }
    }

    /// Idempotency keys observed across create calls, in order.
    pub fn seen_keys(&self) -> Vec<String> {
        self.seen_keys.lock().expect("gateway mutex poisoned").clone()
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.next_failure
            .lock()
            .expect("gateway mutex poisoned")
            .take()
    }
}

impl PaymentGateway for InMemoryPaymentGateway {
    fn create_customer(&self, employer: &Employer) -> Result<String, GatewayError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(format!("cus-{}", employer.id.0))
    }

    fn create_payment_intent(&self, request: CreateIntent) -> Result<PaymentIntent, GatewayError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let mut intents = self.intents.lock().expect("gateway mutex poisoned");
        let mut by_key = self.intent_by_key.lock().expect("gateway mutex poisoned");
        self.seen_keys
            .lock()
            .expect("gateway mutex poisoned")
            .push(request.idempotency_key.clone());
        // Same idempotency key returns the intent minted the first time.
        if let Some(existing) = by_key
            .get(&request.idempotency_key)
            .and_then(|id| intents.get(id))
        {
            return Ok(existing.clone());
        }
        let id = format!("pi_{:06}", self.sequence.fetch_add(1, Ordering::Relaxed));
        let intent = PaymentIntent {
            id: id.clone(),
            status: IntentStatus::RequiresPayment,
            amount: request.amount,
            currency: request.currency,
        };
        by_key.insert(request.idempotency_key, id.clone());
        intents.insert(id, intent.clone());
        Ok(intent)
    }

    fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let intents = self.intents.lock().expect("gateway mutex poisoned");
        intents
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("unknown intent {id}")))
    }
}
