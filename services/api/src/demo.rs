use chrono::{Duration, Utc};
use clap::Args;

use crate::infra::{build_pipeline_state, seed_reference_data};
use hireflow::error::AppError;
use hireflow::pipeline::{
    ActorContext, ApplicationStatus, CandidateId, FeeConfig, JobId, OfferDecision, OfferTerms,
    PaymentKind, PaymentMethod, PipelineRepository, SlotWindow, SweepKind,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Offered annual salary in minor-currency units (cents)
    #[arg(long, default_value_t = 15_000_000)]
    pub(crate) salary: i64,
}

/// Walk one placement from application to settled fee against the
/// in-memory stack, printing each transition.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let (state, repository) =
        build_pipeline_state(FeeConfig::default(), "demo-sweep-token".to_string());
    seed_reference_data(&repository);

    let candidate = ActorContext::candidate("cand-1");
    let employer = ActorContext::employer("emp-1");
    let now = Utc::now();

    let application = state
        .service
        .submit_application(
            &candidate,
            CandidateId("cand-1".to_string()),
            JobId("job-1".to_string()),
            Some("Submitted via the lifecycle demo.".to_string()),
            now,
        )
        .map_err(pipeline_failure)?
        .entity;
    println!("application {} submitted ({})", application.id.0, application.status.label());

    state
        .service
        .review_application(
            &employer,
            &application.id,
            ApplicationStatus::Shortlisted,
            now,
        )
        .map_err(pipeline_failure)?;
    println!("application {} shortlisted", application.id.0);

    let windows: Vec<SlotWindow> = (1..=3)
        .map(|day| SlotWindow {
            start_time: now + Duration::days(day),
            end_time: now + Duration::days(day) + Duration::hours(1),
        })
        .collect();
    let interview = state
        .negotiator
        .propose_slots(&employer, &application.id, windows, 60, 1, now)
        .map_err(pipeline_failure)?
        .entity;
    let slots = state
        .repository
        .slots_for_interview(&interview.id)
        .map_err(|err| pipeline_failure(err.into()))?;
    state
        .negotiator
        .select_slots(
            &candidate,
            &interview.id,
            vec![slots[0].id.clone(), slots[1].id.clone()],
        )
        .map_err(pipeline_failure)?;
    let interview = state
        .negotiator
        .confirm_slot(
            &employer,
            &interview.id,
            &slots[0].id,
            Some("Video call".to_string()),
            now,
        )
        .map_err(pipeline_failure)?
        .entity;
    println!(
        "interview {} scheduled for {}",
        interview.id.0,
        interview
            .scheduled_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default()
    );
    state
        .negotiator
        .complete_interview(&employer, &interview.id, now + Duration::days(1))
        .map_err(pipeline_failure)?;

    let offer = state
        .service
        .make_offer(
            &employer,
            &application.id,
            OfferTerms {
                salary: args.salary,
                start_date: (now + Duration::days(30)).date_naive(),
                expires_at: None,
            },
            now,
        )
        .map_err(pipeline_failure)?
        .entity;
    println!("offer {} extended at salary {}", offer.id.0, offer.salary);

    let resolution = state
        .service
        .respond_to_offer(&candidate, &offer.id, OfferDecision::Accept, None, now)
        .map_err(pipeline_failure)?
        .entity;
    let placement = resolution.placement.ok_or_else(|| {
        AppError::Io(std::io::Error::other("acceptance did not create a placement"))
    })?;
    println!(
        "placement {} created: {}% fee, {} upfront / {} remaining",
        placement.id.0,
        placement.fee_percentage,
        placement.upfront_amount,
        placement.remaining_amount
    );

    state
        .ledger
        .record_payment(
            &employer,
            &placement.id,
            PaymentKind::Upfront,
            Some(placement.upfront_amount),
            PaymentMethod::BankTransfer,
            Some("demo-wire-1".to_string()),
            now,
        )
        .map_err(pipeline_failure)?;
    println!("upfront payment recorded");

    let reminders = state
        .sweeper
        .run(SweepKind::Payments, now + Duration::days(36))
        .map_err(pipeline_failure)?;
    println!(
        "payment sweep at day 36: scanned {}, notified {}",
        reminders.scanned, reminders.notified
    );

    let settled = state
        .ledger
        .record_payment(
            &employer,
            &placement.id,
            PaymentKind::Remaining,
            Some(placement.remaining_amount),
            PaymentMethod::BankTransfer,
            Some("demo-wire-2".to_string()),
            now + Duration::days(37),
        )
        .map_err(pipeline_failure)?
        .entity;
    println!(
        "placement {} settled ({})",
        settled.id.0,
        settled.payment_status.label()
    );

    Ok(())
}

/// The demo runs against a live in-memory stack, so any pipeline failure
/// is a bug in the walk itself; surface it as an io error for the CLI.
fn pipeline_failure(err: hireflow::pipeline::PipelineError) -> AppError {
    AppError::Io(std::io::Error::other(err.to_string()))
}
