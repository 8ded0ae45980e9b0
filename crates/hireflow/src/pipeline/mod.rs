//! Hiring-pipeline core: the application/interview/offer state machine,
//! staged fee calculation, availability negotiation, scheduled expiry
//! sweeps, profile access gating, and the placement payment ledger.

pub mod access;
pub mod domain;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod memory;
pub mod negotiation;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweeper;

#[cfg(test)]
mod tests;

pub use access::{access_level, project_candidate, CandidateProfileView, ProfileAccess};
pub use domain::{
    ActorContext, ActorRole, AdminId, Application, ApplicationId, ApplicationStatus,
    AvailabilitySlot, Candidate, CandidateId, CandidateResponse, ClaimState, Employer,
    EmployerId, ExperienceLevel, Interview, InterviewId, InterviewStatus, Introduction,
    IntroductionStatus, Job, JobId, JobStatus, Offer, OfferId, OfferStatus, PaymentMethod,
    PaymentReminder, PaymentStatus, Placement, PlacementId, ReminderSeverity, SlotId,
    SlotSelection,
};
pub use error::PipelineError;
pub use fees::{calculate_fee, tier_percentage, FeeBreakdown, FeeConfig, FeeError};
pub use ledger::{
    CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent, PaymentKind,
    PaymentLedger,
};
pub use memory::{
    InMemoryNotificationPublisher, InMemoryPaymentGateway, InMemoryPipelineRepository,
};
pub use negotiation::{AvailabilityNegotiator, SlotWindow};
pub use repository::{
    NotificationError, NotificationIntent, NotificationPublisher, PaymentIntentRecord,
    PaymentLeg, PipelineRepository, RepositoryError,
};
pub use router::{pipeline_router, PipelineState};
pub use service::{
    CommandOutcome, OfferDecision, OfferResolution, OfferTerms, PipelineService,
};
pub use sweeper::{ExpirationSweeper, SweepKind, SweepSummary};
