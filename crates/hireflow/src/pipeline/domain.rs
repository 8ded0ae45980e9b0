use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub String);

/// Identifier wrapper for employers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployerId(pub String);

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for interviews.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterviewId(pub String);

/// Identifier wrapper for employer-proposed availability slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(pub String);

/// Identifier wrapper for offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

/// Identifier wrapper for placements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementId(pub String);

/// Identifier wrapper for platform administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminId(pub String);

/// Role of the authenticated caller, supplied by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Candidate,
    Employer,
    Admin,
}

/// Request-scoped identity passed explicitly into every command.
///
/// Authentication mechanics are owned by a collaborator; commands only ever
/// see this resolved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: String,
    pub role: ActorRole,
}

impl ActorContext {
    pub fn candidate(id: impl Into<String>) -> Self {
        Self {
            actor_id: id.into(),
            role: ActorRole::Candidate,
        }
    }

    pub fn employer(id: impl Into<String>) -> Self {
        Self {
            actor_id: id.into(),
            role: ActorRole::Employer,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            actor_id: id.into(),
            role: ActorRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Admins may act on anyone's behalf; candidates only on their own.
    pub fn acts_for_candidate(&self, candidate_id: &CandidateId) -> bool {
        match self.role {
            ActorRole::Admin => true,
            ActorRole::Candidate => self.actor_id == candidate_id.0,
            ActorRole::Employer => false,
        }
    }

    pub fn acts_for_employer(&self, employer_id: &EmployerId) -> bool {
        match self.role {
            ActorRole::Admin => true,
            ActorRole::Employer => self.actor_id == employer_id.0,
            ActorRole::Candidate => false,
        }
    }
}

/// Seniority tier used by the fee calculator and candidate profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Executive,
}

impl ExperienceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Executive => "executive",
        }
    }
}

/// Status of an application throughout the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Shortlisted,
    InterviewScheduled,
    Interviewed,
    Offered,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Shortlisted => "shortlisted",
            Self::InterviewScheduled => "interview_scheduled",
            Self::Interviewed => "interviewed",
            Self::Offered => "offered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Position along the forward review path. Terminal exits carry no rank.
    pub const fn progress_rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Reviewed => Some(1),
            Self::Shortlisted => Some(2),
            Self::InterviewScheduled => Some(3),
            Self::Interviewed => Some(4),
            Self::Offered => Some(5),
            Self::Accepted => Some(6),
            Self::Rejected | Self::Withdrawn => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Withdrawn)
    }
}

/// Administrative claim bookkeeping on an application.
///
/// Converted is set when the application turns into a placement; neither a
/// claimed nor a converted application can be claimed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Unclaimed,
    Claimed { admin_id: AdminId },
    Converted,
}

/// A candidate's request to be considered for a job. At most one per
/// (candidate, job) pair; never physically deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub claim: ClaimState,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Status of an interview within the availability negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    AwaitingCandidate,
    AwaitingConfirmation,
    Scheduled,
    Confirmed,
    Completed,
    Rescheduled,
    Cancelled,
}

impl InterviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AwaitingCandidate => "awaiting_candidate",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Rescheduled => "rescheduled",
            Self::Cancelled => "cancelled",
        }
    }
}

/// An interview round for one application.
///
/// `scheduled_at` is populated only in scheduled/confirmed/completed.
/// `rescheduled_from` links a replacement interview back to the one it
/// superseded, forming an acyclic audit chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub employer_id: EmployerId,
    pub status: InterviewStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub round: u8,
    pub notes: Option<String>,
    pub meeting_details: Option<String>,
    pub pending_reschedule: bool,
    pub rescheduled_from: Option<InterviewId>,
    pub reminder_24h_sent_at: Option<DateTime<Utc>>,
    pub reminder_1h_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Employer-proposed time window for an interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: SlotId,
    pub interview_id: InterviewId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Candidate's chosen subset of proposed slots. Replaced wholesale on
/// re-selection, never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSelection {
    pub interview_id: InterviewId,
    pub slot_id: SlotId,
}

/// Status of an offer. Transitions out of pending are one-way and mutually
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Withdrawn,
}

impl OfferStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Withdrawn => "withdrawn",
        }
    }
}

/// Employer-issued compensation terms tied to one application. At most one
/// offer per application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub employer_id: EmployerId,
    /// Annual salary in integer minor-currency units.
    pub salary: i64,
    pub start_date: NaiveDate,
    pub status: OfferStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment progress on a placement. Remaining can only be paid after
/// upfront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    UpfrontPaid,
    FullyPaid,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UpfrontPaid => "upfront_paid",
            Self::FullyPaid => "fully_paid",
        }
    }
}

/// How a manually recorded payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Check,
}

/// Escalation stage of a balance reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderSeverity {
    Due,
    Overdue,
}

impl ReminderSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Overdue => "overdue",
        }
    }
}

/// Last balance reminder sent for a placement, so repeated sweep passes do
/// not resend until the severity escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReminder {
    pub severity: ReminderSeverity,
    pub sent_at: DateTime<Utc>,
}

/// The billable record created exactly once when an offer is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub offer_id: OfferId,
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub employer_id: EmployerId,
    pub salary: i64,
    pub fee_percentage: u8,
    pub placement_fee: i64,
    pub upfront_amount: i64,
    pub remaining_amount: i64,
    pub start_date: NaiveDate,
    pub guarantee_end_date: NaiveDate,
    pub payment_status: PaymentStatus,
    pub upfront_paid_at: Option<DateTime<Utc>>,
    pub remaining_paid_at: Option<DateTime<Utc>>,
    pub upfront_transaction: Option<String>,
    pub remaining_transaction: Option<String>,
    pub payment_reminder: Option<PaymentReminder>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Expired,
    Filled,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Filled => "filled",
            Self::Closed => "closed",
        }
    }
}

/// Reference entity: a job posting owned by an employer. Created and edited
/// by collaborators outside this core; the pipeline reads it and expires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub employer_id: EmployerId,
    pub title: String,
    pub status: JobStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Reference entity: a candidate profile. The access gate decides which of
/// these fields an employer may see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub experience_level: ExperienceLevel,
    pub email: String,
    pub phone: Option<String>,
    pub links: Vec<String>,
    pub resume_url: Option<String>,
    pub available: bool,
}

/// Reference entity: an employer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employer {
    pub id: EmployerId,
    pub company_name: String,
    /// Presence of a signed service agreement gates candidate access.
    pub agreement_signed_at: Option<DateTime<Utc>>,
    /// Running total of placement fees fully paid, in minor units.
    pub total_spent: i64,
    /// Payment-gateway customer reference, created lazily on first intent.
    pub gateway_customer: Option<String>,
}

/// Negotiation stages of an introduction. The forward progression runs
/// profile_viewed through hired; the remaining variants are exits available
/// at any point before hired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroductionStatus {
    ProfileViewed,
    IntroRequested,
    Introduced,
    Interviewing,
    OfferExtended,
    Hired,
    CandidateDeclined,
    Expired,
    ClosedNoHire,
}

impl IntroductionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProfileViewed => "profile_viewed",
            Self::IntroRequested => "intro_requested",
            Self::Introduced => "introduced",
            Self::Interviewing => "interviewing",
            Self::OfferExtended => "offer_extended",
            Self::Hired => "hired",
            Self::CandidateDeclined => "candidate_declined",
            Self::Expired => "expired",
            Self::ClosedNoHire => "closed_no_hire",
        }
    }

    /// Position along the forward progression; exits carry no rank.
    pub const fn stage_rank(self) -> Option<u8> {
        match self {
            Self::ProfileViewed => Some(0),
            Self::IntroRequested => Some(1),
            Self::Introduced => Some(2),
            Self::Interviewing => Some(3),
            Self::OfferExtended => Some(4),
            Self::Hired => Some(5),
            Self::CandidateDeclined | Self::Expired | Self::ClosedNoHire => None,
        }
    }
}

/// Candidate's explicit answer to an introduction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateResponse {
    Accepted,
    Declined,
}

/// The gated-access negotiation record between one employer and one
/// candidate. Unique per (employer, candidate) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introduction {
    pub employer_id: EmployerId,
    pub candidate_id: CandidateId,
    pub status: IntroductionStatus,
    pub candidate_response: Option<CandidateResponse>,
    pub created_at: DateTime<Utc>,
}
