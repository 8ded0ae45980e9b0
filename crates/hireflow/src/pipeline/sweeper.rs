use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    ApplicationStatus, Interview, InterviewStatus, JobStatus, OfferStatus, PaymentReminder,
    ReminderSeverity,
};
use super::error::PipelineError;
use super::repository::{
    NotificationIntent, NotificationPublisher, PipelineRepository, RepositoryError,
};

/// Which scheduled pass to run. Offers and reminders run hourly in
/// production; jobs and payment reminders daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    Offers,
    Jobs,
    InterviewReminders,
    Payments,
}

impl SweepKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offers => "offers",
            Self::Jobs => "jobs",
            Self::InterviewReminders => "interview_reminders",
            Self::Payments => "payments",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "offers" => Some(Self::Offers),
            "jobs" => Some(Self::Jobs),
            "interview_reminders" => Some(Self::InterviewReminders),
            "payments" => Some(Self::Payments),
            _ => None,
        }
    }
}

/// Outcome of one sweep pass, returned to the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub kind: SweepKind,
    pub scanned: usize,
    pub transitioned: usize,
    pub notified: usize,
    pub errors: Vec<String>,
}

impl SweepSummary {
    fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            scanned: 0,
            transitioned: 0,
            notified: 0,
            errors: Vec::new(),
        }
    }
}

const JOB_DEFAULT_LIFETIME_DAYS: i64 = 60;
const BALANCE_DUE_DAYS: i64 = 30;
const BALANCE_OVERDUE_GRACE_DAYS: i64 = 14;

/// Time-driven batch pass over offers, jobs, interviews, and placement
/// balances. Every pass is safe to re-run: state moves are guarded
/// compare-and-swaps and reminders leave sent-markers, so already-handled
/// entities are skipped. Notification failures are collected per entity
/// and never abort the batch.
pub struct ExpirationSweeper<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> ExpirationSweeper<R, N>
where
    R: PipelineRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    pub fn run(&self, kind: SweepKind, now: DateTime<Utc>) -> Result<SweepSummary, PipelineError> {
        let summary = match kind {
            SweepKind::Offers => self.sweep_offers(now)?,
            SweepKind::Jobs => self.sweep_jobs(now)?,
            SweepKind::InterviewReminders => self.sweep_interview_reminders(now)?,
            SweepKind::Payments => self.sweep_payment_reminders(now)?,
        };
        info!(
            kind = kind.label(),
            scanned = summary.scanned,
            transitioned = summary.transitioned,
            notified = summary.notified,
            errors = summary.errors.len(),
            "sweep pass finished"
        );
        Ok(summary)
    }

    /// Pending offers past their expiry move to expired and their
    /// applications to rejected. The status guard means a just-accepted
    /// offer can never be regressed by a concurrent sweep.
    fn sweep_offers(&self, now: DateTime<Utc>) -> Result<SweepSummary, PipelineError> {
        let mut summary = SweepSummary::new(SweepKind::Offers);
        for offer in self.repository.offers_with_status(OfferStatus::Pending)? {
            summary.scanned += 1;
            if offer.expires_at >= now {
                continue;
            }

            let mut expired = offer.clone();
            expired.status = OfferStatus::Expired;
            match self
                .repository
                .transition_offer(&offer.id, OfferStatus::Pending, expired)
            {
                Ok(()) => summary.transitioned += 1,
                Err(RepositoryError::Conflict) => continue,
                Err(err) => {
                    summary
                        .errors
                        .push(format!("offer {}: {err}", offer.id.0));
                    continue;
                }
            }

            if let Err(err) = self.reject_application(&offer) {
                summary
                    .errors
                    .push(format!("application for offer {}: {err}", offer.id.0));
            }

            let payload_offer = offer.id.0.clone();
            self.dispatch(
                &mut summary,
                NotificationIntent::new(&offer.candidate_id.0, "offer_expired")
                    .with("offer_id", payload_offer.clone()),
            );
            self.dispatch(
                &mut summary,
                NotificationIntent::new(&offer.employer_id.0, "offer_expired")
                    .with("offer_id", payload_offer),
            );
        }
        Ok(summary)
    }

    /// Active jobs expire at their deadline, or after the default lifetime
    /// when no deadline was set.
    fn sweep_jobs(&self, now: DateTime<Utc>) -> Result<SweepSummary, PipelineError> {
        let mut summary = SweepSummary::new(SweepKind::Jobs);
        for job in self.repository.jobs_with_status(JobStatus::Active)? {
            summary.scanned += 1;
            let past_deadline = match job.deadline {
                Some(deadline) => deadline < now,
                None => job.created_at + Duration::days(JOB_DEFAULT_LIFETIME_DAYS) < now,
            };
            if !past_deadline {
                continue;
            }

            let mut expired = job.clone();
            expired.status = JobStatus::Expired;
            match self
                .repository
                .transition_job(&job.id, JobStatus::Active, expired)
            {
                Ok(()) => summary.transitioned += 1,
                Err(RepositoryError::Conflict) => continue,
                Err(err) => {
                    summary.errors.push(format!("job {}: {err}", job.id.0));
                    continue;
                }
            }

            self.dispatch(
                &mut summary,
                NotificationIntent::new(&job.employer_id.0, "job_expired")
                    .with("job_id", job.id.0.clone())
                    .with("title", job.title.clone()),
            );
        }
        Ok(summary)
    }

    /// Reminders ahead of committed interviews: a wide window around T−24h
    /// and a tight one around T−1h. Sent-markers keep re-runs quiet; the
    /// interview status never changes.
    fn sweep_interview_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary, PipelineError> {
        let mut summary = SweepSummary::new(SweepKind::InterviewReminders);
        let committed = self.repository.interviews_with_status(&[
            InterviewStatus::Scheduled,
            InterviewStatus::Confirmed,
        ])?;
        for interview in committed {
            summary.scanned += 1;
            let Some(scheduled_at) = interview.scheduled_at else {
                continue;
            };

            let day_before = scheduled_at - Duration::hours(24);
            if interview.reminder_24h_sent_at.is_none()
                && within(now, day_before, Duration::minutes(30))
            {
                self.send_interview_reminder(&mut summary, &interview, scheduled_at, "24h", now,
                    |record, at| record.reminder_24h_sent_at = Some(at));
            }

            let hour_before = scheduled_at - Duration::hours(1);
            if interview.reminder_1h_sent_at.is_none()
                && within(now, hour_before, Duration::minutes(5))
            {
                self.send_interview_reminder(&mut summary, &interview, scheduled_at, "1h", now,
                    |record, at| record.reminder_1h_sent_at = Some(at));
            }
        }
        Ok(summary)
    }

    /// Balance reminders for placements whose upfront leg is paid and
    /// whose remainder has been outstanding for the due window. Wording
    /// escalates once overdue; the stored severity keeps identical passes
    /// from resending.
    fn sweep_payment_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary, PipelineError> {
        let mut summary = SweepSummary::new(SweepKind::Payments);
        for placement in self.repository.placements_awaiting_balance()? {
            summary.scanned += 1;
            let Some(upfront_paid_at) = placement.upfront_paid_at else {
                continue;
            };
            let due_at = upfront_paid_at + Duration::days(BALANCE_DUE_DAYS);
            if now < due_at {
                continue;
            }
            let severity = if now >= due_at + Duration::days(BALANCE_OVERDUE_GRACE_DAYS) {
                ReminderSeverity::Overdue
            } else {
                ReminderSeverity::Due
            };
            if placement
                .payment_reminder
                .map(|reminder| reminder.severity)
                == Some(severity)
            {
                continue;
            }

            let days_outstanding = (now - upfront_paid_at).num_days();
            let intent =
                NotificationIntent::new(&placement.employer_id.0, "placement_balance_reminder")
                    .with("placement_id", placement.id.0.clone())
                    .with("remaining_amount", placement.remaining_amount.to_string())
                    .with("days_outstanding", days_outstanding.to_string())
                    .with("severity", severity.label());
            if !self.dispatch(&mut summary, intent) {
                continue;
            }

            let mut reminded = placement.clone();
            reminded.payment_reminder = Some(PaymentReminder {
                severity,
                sent_at: now,
            });
            if let Err(err) = self.repository.update_placement(reminded) {
                summary
                    .errors
                    .push(format!("placement {}: {err}", placement.id.0));
            }
        }
        Ok(summary)
    }

    fn send_interview_reminder(
        &self,
        summary: &mut SweepSummary,
        interview: &Interview,
        scheduled_at: DateTime<Utc>,
        horizon: &str,
        now: DateTime<Utc>,
        mark: impl FnOnce(&mut Interview, DateTime<Utc>),
    ) {
        let scheduled = scheduled_at.to_rfc3339();
        let candidate_sent = self.dispatch(
            summary,
            NotificationIntent::new(&interview.candidate_id.0, "interview_reminder")
                .with("interview_id", interview.id.0.clone())
                .with("scheduled_at", scheduled.clone())
                .with("horizon", horizon),
        );
        let employer_sent = self.dispatch(
            summary,
            NotificationIntent::new(&interview.employer_id.0, "interview_reminder")
                .with("interview_id", interview.id.0.clone())
                .with("scheduled_at", scheduled)
                .with("horizon", horizon),
        );
        if !candidate_sent && !employer_sent {
            return;
        }

        let mut marked = interview.clone();
        mark(&mut marked, now);
        if let Err(err) = self.repository.update_interview(marked) {
            summary
                .errors
                .push(format!("interview {}: {err}", interview.id.0));
        }
    }

    fn reject_application(&self, offer: &super::domain::Offer) -> Result<(), RepositoryError> {
        if let Some(mut application) = self.repository.fetch_application(&offer.application_id)? {
            if !application.status.is_terminal() {
                application.status = ApplicationStatus::Rejected;
                self.repository.update_application(application)?;
            }
        }
        Ok(())
    }

    /// Publish one intent, folding failures into the summary. Returns
    /// whether the send went through.
    fn dispatch(&self, summary: &mut SweepSummary, intent: NotificationIntent) -> bool {
        let recipient = intent.recipient.clone();
        let template = intent.template.clone();
        match self.notifier.publish(intent) {
            Ok(()) => {
                summary.notified += 1;
                true
            }
            Err(err) => {
                warn!(%recipient, template, error = %err, "notification dispatch failed");
                summary
                    .errors
                    .push(format!("notify {recipient} ({template}): {err}"));
                false
            }
        }
    }
}

fn within(now: DateTime<Utc>, target: DateTime<Utc>, tolerance: Duration) -> bool {
    now >= target - tolerance && now <= target + tolerance
}
