use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::domain::{
    ActorContext, ApplicationId, ApplicationStatus, AvailabilitySlot, Interview, InterviewId,
    InterviewStatus, IntroductionStatus, SlotId, SlotSelection,
};
use super::error::PipelineError;
use super::repository::{NotificationIntent, PipelineRepository};
use super::service::{advance_introduction, CommandOutcome};

/// One proposed time window, as supplied by the employer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlotWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

static INTERVIEW_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SLOT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_interview_id() -> InterviewId {
    let id = INTERVIEW_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InterviewId(format!("int-{id:06}"))
}

fn next_slot_id() -> SlotId {
    let id = SLOT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SlotId(format!("slot-{id:06}"))
}

/// Scheduling sub-protocol: the employer proposes slots, the candidate
/// selects a subset, the employer confirms exactly one. Splitting proposal,
/// selection, and confirmation keeps either party free to back out before
/// commitment, and rescheduling archives the old interview instead of
/// editing it in place.
pub struct AvailabilityNegotiator<R> {
    repository: Arc<R>,
}

impl<R> AvailabilityNegotiator<R>
where
    R: PipelineRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Open a round of scheduling by proposing availability windows. When
    /// the application's current interview is flagged for rescheduling, it
    /// is archived and the fresh interview records the chain link.
    pub fn propose_slots(
        &self,
        actor: &ActorContext,
        application_id: &ApplicationId,
        windows: Vec<SlotWindow>,
        duration_minutes: u32,
        round: u8,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        if windows.is_empty() {
            return Err(PipelineError::Validation(
                "at least one availability window is required".to_string(),
            ));
        }
        for window in &windows {
            if window.end_time <= window.start_time {
                return Err(PipelineError::Validation(format!(
                    "window ending {} does not follow its start",
                    window.end_time
                )));
            }
        }

        let mut application = self
            .repository
            .fetch_application(application_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("application {}", application_id.0)))?;
        let job = self
            .repository
            .fetch_job(&application.job_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("job {}", application.job_id.0)))?;
        if !actor.acts_for_employer(&job.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the hiring employer may propose interview slots".to_string(),
            ));
        }
        if application.status.is_terminal()
            || application.status == ApplicationStatus::Accepted
        {
            return Err(PipelineError::Conflict(format!(
                "application {} is closed to scheduling ({})",
                application.id.0,
                application.status.label()
            )));
        }

        let rescheduled_from = self.archive_pending_reschedule(&application.id)?;

        let interview = Interview {
            id: next_interview_id(),
            application_id: application.id.clone(),
            candidate_id: application.candidate_id.clone(),
            employer_id: job.employer_id.clone(),
            status: InterviewStatus::AwaitingCandidate,
            scheduled_at: None,
            duration_minutes,
            round,
            notes: None,
            meeting_details: None,
            pending_reschedule: false,
            rescheduled_from,
            reminder_24h_sent_at: None,
            reminder_1h_sent_at: None,
            created_at: now,
        };
        let slots: Vec<AvailabilitySlot> = windows
            .iter()
            .map(|window| AvailabilitySlot {
                id: next_slot_id(),
                interview_id: interview.id.clone(),
                start_time: window.start_time,
                end_time: window.end_time,
            })
            .collect();
        let slot_count = slots.len();
        let stored = self.repository.insert_interview(interview, slots)?;

        let scheduled_rank = ApplicationStatus::InterviewScheduled
            .progress_rank()
            .unwrap_or_default();
        if application.status.progress_rank().unwrap_or_default() < scheduled_rank {
            application.status = ApplicationStatus::InterviewScheduled;
            self.repository.update_application(application)?;
        }

        let notification =
            NotificationIntent::new(&stored.candidate_id.0, "interview_slots_proposed")
                .with("interview_id", stored.id.0.clone())
                .with("round", stored.round.to_string())
                .with("slot_count", slot_count.to_string());

        Ok(CommandOutcome {
            entity: stored,
            notifications: vec![notification],
        })
    }

    /// Candidate picks their workable subset of the proposed slots. The
    /// previous selection set is replaced wholesale; the status guard on
    /// the transition keeps a concurrent reschedule from interleaving.
    pub fn select_slots(
        &self,
        actor: &ActorContext,
        interview_id: &InterviewId,
        slot_ids: Vec<SlotId>,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        let interview = self.require_interview(interview_id)?;
        if !actor.acts_for_candidate(&interview.candidate_id) {
            return Err(PipelineError::Forbidden(
                "only the interview's candidate may select slots".to_string(),
            ));
        }
        if interview.status != InterviewStatus::AwaitingCandidate {
            return Err(PipelineError::Conflict(format!(
                "interview {} is not awaiting the candidate ({})",
                interview.id.0,
                interview.status.label()
            )));
        }
        if slot_ids.is_empty() {
            return Err(PipelineError::Validation(
                "select at least one slot".to_string(),
            ));
        }
        let proposed = self.repository.slots_for_interview(&interview.id)?;
        for slot_id in &slot_ids {
            if !proposed.iter().any(|slot| &slot.id == slot_id) {
                return Err(PipelineError::Validation(format!(
                    "slot {} was not proposed for interview {}",
                    slot_id.0, interview.id.0
                )));
            }
        }

        let selections = slot_ids
            .iter()
            .map(|slot_id| SlotSelection {
                interview_id: interview.id.clone(),
                slot_id: slot_id.clone(),
            })
            .collect();
        self.repository
            .replace_slot_selections(&interview.id, selections)?;

        let mut updated = interview.clone();
        updated.status = InterviewStatus::AwaitingConfirmation;
        self.repository.transition_interview(
            &interview.id,
            InterviewStatus::AwaitingCandidate,
            updated.clone(),
        )?;

        let notification = NotificationIntent::new(&updated.employer_id.0, "slots_selected")
            .with("interview_id", updated.id.0.clone())
            .with("selected_count", slot_ids.len().to_string());

        Ok(CommandOutcome {
            entity: updated,
            notifications: vec![notification],
        })
    }

    /// Employer commits to exactly one of the candidate's selections.
    pub fn confirm_slot(
        &self,
        actor: &ActorContext,
        interview_id: &InterviewId,
        slot_id: &SlotId,
        meeting_details: Option<String>,
        _now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        let interview = self.require_interview(interview_id)?;
        if !actor.acts_for_employer(&interview.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the hiring employer may confirm a slot".to_string(),
            ));
        }
        if interview.status != InterviewStatus::AwaitingConfirmation {
            return Err(PipelineError::Conflict(format!(
                "interview {} is not awaiting confirmation ({})",
                interview.id.0,
                interview.status.label()
            )));
        }
        let selections = self.repository.selections_for_interview(&interview.id)?;
        if !selections.iter().any(|choice| &choice.slot_id == slot_id) {
            return Err(PipelineError::Validation(format!(
                "slot {} is not among the candidate's selections",
                slot_id.0
            )));
        }
        let slot = self
            .repository
            .fetch_slot(slot_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("slot {}", slot_id.0)))?;

        let mut updated = interview.clone();
        updated.status = InterviewStatus::Scheduled;
        updated.scheduled_at = Some(slot.start_time);
        updated.meeting_details = meeting_details;
        self.repository.transition_interview(
            &interview.id,
            InterviewStatus::AwaitingConfirmation,
            updated.clone(),
        )?;

        advance_introduction(
            self.repository.as_ref(),
            &updated.employer_id,
            &updated.candidate_id,
            IntroductionStatus::Interviewing,
        )?;

        let scheduled_at = slot.start_time.to_rfc3339();
        let notifications = vec![
            NotificationIntent::new(&updated.candidate_id.0, "interview_scheduled")
                .with("interview_id", updated.id.0.clone())
                .with("scheduled_at", scheduled_at.clone()),
            NotificationIntent::new(&updated.employer_id.0, "interview_scheduled")
                .with("interview_id", updated.id.0.clone())
                .with("scheduled_at", scheduled_at),
        ];

        Ok(CommandOutcome {
            entity: updated,
            notifications,
        })
    }

    /// Candidate acknowledges a scheduled interview.
    pub fn confirm_attendance(
        &self,
        actor: &ActorContext,
        interview_id: &InterviewId,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        let interview = self.require_interview(interview_id)?;
        if !actor.acts_for_candidate(&interview.candidate_id) {
            return Err(PipelineError::Forbidden(
                "only the interview's candidate may confirm attendance".to_string(),
            ));
        }
        if interview.status != InterviewStatus::Scheduled {
            return Err(PipelineError::Conflict(format!(
                "interview {} is not scheduled ({})",
                interview.id.0,
                interview.status.label()
            )));
        }

        let mut updated = interview.clone();
        updated.status = InterviewStatus::Confirmed;
        self.repository.transition_interview(
            &interview.id,
            InterviewStatus::Scheduled,
            updated.clone(),
        )?;

        let notification = NotificationIntent::new(&updated.employer_id.0, "interview_confirmed")
            .with("interview_id", updated.id.0.clone());

        Ok(CommandOutcome {
            entity: updated,
            notifications: vec![notification],
        })
    }

    /// Flag a committed interview for rescheduling. The interview stays
    /// live until replacement slots are proposed; the flag is an explicit
    /// field, and the reason travels in the notes.
    pub fn request_reschedule(
        &self,
        actor: &ActorContext,
        interview_id: &InterviewId,
        reason: String,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        let interview = self.require_interview(interview_id)?;
        let by_candidate = actor.acts_for_candidate(&interview.candidate_id);
        if !by_candidate && !actor.acts_for_employer(&interview.employer_id) {
            return Err(PipelineError::Forbidden(
                "only a party to the interview may request a reschedule".to_string(),
            ));
        }
        if !matches!(
            interview.status,
            InterviewStatus::Scheduled | InterviewStatus::Confirmed
        ) {
            return Err(PipelineError::Conflict(format!(
                "interview {} cannot be rescheduled ({})",
                interview.id.0,
                interview.status.label()
            )));
        }

        let mut updated = interview.clone();
        updated.pending_reschedule = true;
        updated.notes = Some(match interview.notes {
            Some(notes) => format!("{notes}\nreschedule requested: {reason}"),
            None => format!("reschedule requested: {reason}"),
        });
        self.repository.update_interview(updated.clone())?;

        let counterparty = if by_candidate {
            &updated.employer_id.0
        } else {
            &updated.candidate_id.0
        };
        let notification = NotificationIntent::new(counterparty, "reschedule_requested")
            .with("interview_id", updated.id.0.clone())
            .with("reason", reason);

        Ok(CommandOutcome {
            entity: updated,
            notifications: vec![notification],
        })
    }

    /// Mark a committed interview as held and move the application along.
    pub fn complete_interview(
        &self,
        actor: &ActorContext,
        interview_id: &InterviewId,
        _now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        let interview = self.require_interview(interview_id)?;
        if !actor.acts_for_employer(&interview.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the hiring employer may complete an interview".to_string(),
            ));
        }
        if !matches!(
            interview.status,
            InterviewStatus::Scheduled | InterviewStatus::Confirmed
        ) {
            return Err(PipelineError::Conflict(format!(
                "interview {} is not in progress ({})",
                interview.id.0,
                interview.status.label()
            )));
        }

        let expected = interview.status;
        let mut updated = interview.clone();
        updated.status = InterviewStatus::Completed;
        self.repository
            .transition_interview(&interview.id, expected, updated.clone())?;

        if let Some(mut application) =
            self.repository.fetch_application(&interview.application_id)?
        {
            let interviewed_rank = ApplicationStatus::Interviewed
                .progress_rank()
                .unwrap_or_default();
            if application
                .status
                .progress_rank()
                .map_or(false, |rank| rank < interviewed_rank)
            {
                application.status = ApplicationStatus::Interviewed;
                self.repository.update_application(application)?;
            }
        }

        let notification =
            NotificationIntent::new(&updated.candidate_id.0, "interview_completed")
                .with("interview_id", updated.id.0.clone());

        Ok(CommandOutcome {
            entity: updated,
            notifications: vec![notification],
        })
    }

    /// Cancel an interview before it is held.
    pub fn cancel_interview(
        &self,
        actor: &ActorContext,
        interview_id: &InterviewId,
        reason: Option<String>,
    ) -> Result<CommandOutcome<Interview>, PipelineError> {
        let interview = self.require_interview(interview_id)?;
        let by_candidate = actor.acts_for_candidate(&interview.candidate_id);
        if !by_candidate && !actor.acts_for_employer(&interview.employer_id) {
            return Err(PipelineError::Forbidden(
                "only a party to the interview may cancel it".to_string(),
            ));
        }
        if matches!(
            interview.status,
            InterviewStatus::Completed
                | InterviewStatus::Cancelled
                | InterviewStatus::Rescheduled
        ) {
            return Err(PipelineError::Conflict(format!(
                "interview {} is already settled ({})",
                interview.id.0,
                interview.status.label()
            )));
        }

        let expected = interview.status;
        let mut updated = interview.clone();
        updated.status = InterviewStatus::Cancelled;
        // scheduled_at only carries a value while the meeting is live.
        updated.scheduled_at = None;
        if let Some(reason) = &reason {
            updated.notes = Some(match interview.notes {
                Some(notes) => format!("{notes}\ncancelled: {reason}"),
                None => format!("cancelled: {reason}"),
            });
        }
        self.repository
            .transition_interview(&interview.id, expected, updated.clone())?;

        let counterparty = if by_candidate {
            &updated.employer_id.0
        } else {
            &updated.candidate_id.0
        };
        let notification = NotificationIntent::new(counterparty, "interview_cancelled")
            .with("interview_id", updated.id.0.clone());

        Ok(CommandOutcome {
            entity: updated,
            notifications: vec![notification],
        })
    }

    /// Archive the application's committed interview when it is flagged
    /// pending-reschedule, returning the chain link for its successor.
    fn archive_pending_reschedule(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<InterviewId>, PipelineError> {
        let interviews = self.repository.interviews_for_application(application_id)?;
        let Some(current) = interviews.into_iter().find(|interview| {
            interview.pending_reschedule
                && matches!(
                    interview.status,
                    InterviewStatus::Scheduled | InterviewStatus::Confirmed
                )
        }) else {
            return Ok(None);
        };

        let expected = current.status;
        let mut archived = current.clone();
        archived.status = InterviewStatus::Rescheduled;
        archived.scheduled_at = None;
        archived.pending_reschedule = false;
        self.repository
            .transition_interview(&current.id, expected, archived)?;
        Ok(Some(current.id))
    }

    fn require_interview(&self, id: &InterviewId) -> Result<Interview, PipelineError> {
        self.repository
            .fetch_interview(id)?
            .ok_or_else(|| PipelineError::NotFound(format!("interview {}", id.0)))
    }
}
