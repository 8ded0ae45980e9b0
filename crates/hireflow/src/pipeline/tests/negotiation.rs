use chrono::Duration;

use super::common::{
    candidate_actor, employer_actor, harness, now, scheduled_interview, submit, windows,
};
use crate::pipeline::domain::{
    ActorContext, ApplicationStatus, InterviewStatus, IntroductionStatus, SlotId,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::repository::PipelineRepository;

#[test]
fn proposal_requires_at_least_one_window() {
    let harness = harness();
    let application = submit(&harness);

    let err = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, Vec::new(), 60, 1, now())
        .expect_err("empty proposal rejected");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn proposal_opens_negotiation_and_moves_the_application() {
    let harness = harness();
    let application = submit(&harness);

    let outcome = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds");
    let interview = outcome.entity;

    assert_eq!(interview.status, InterviewStatus::AwaitingCandidate);
    assert!(interview.scheduled_at.is_none());
    assert!(interview.rescheduled_from.is_none());
    assert_eq!(outcome.notifications[0].template, "interview_slots_proposed");

    let slots = harness
        .repository
        .slots_for_interview(&interview.id)
        .expect("slots load");
    assert_eq!(slots.len(), 3);

    let stored = harness
        .repository
        .fetch_application(&application.id)
        .expect("lookup works")
        .expect("application exists");
    assert_eq!(stored.status, ApplicationStatus::InterviewScheduled);
}

#[test]
fn only_the_candidate_may_select_slots() {
    let harness = harness();
    let application = submit(&harness);
    let interview = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds")
        .entity;

    let err = harness
        .negotiator
        .select_slots(
            &ActorContext::candidate("cand-999"),
            &interview.id,
            vec![SlotId("slot-anything".to_string())],
        )
        .expect_err("stranger rejected");
    assert!(matches!(err, PipelineError::Forbidden(_)));
}

#[test]
fn selection_must_stay_within_the_proposed_slots() {
    let harness = harness();
    let application = submit(&harness);
    let interview = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds")
        .entity;

    let err = harness
        .negotiator
        .select_slots(
            &candidate_actor(),
            &interview.id,
            vec![SlotId("slot-unknown".to_string())],
        )
        .expect_err("foreign slot rejected");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn reselection_replaces_the_prior_set_wholesale() {
    let harness = harness();
    let application = submit(&harness);
    let interview = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds")
        .entity;
    let slots = harness
        .repository
        .slots_for_interview(&interview.id)
        .expect("slots load");

    harness
        .negotiator
        .select_slots(
            &candidate_actor(),
            &interview.id,
            vec![slots[0].id.clone(), slots[1].id.clone()],
        )
        .expect("first selection succeeds");

    // The second pass is only legal while awaiting the candidate, so put
    // the interview back first.
    let mut reopened = harness
        .repository
        .fetch_interview(&interview.id)
        .expect("lookup works")
        .expect("interview exists");
    reopened.status = InterviewStatus::AwaitingCandidate;
    harness
        .repository
        .update_interview(reopened)
        .expect("reset works");

    harness
        .negotiator
        .select_slots(&candidate_actor(), &interview.id, vec![slots[2].id.clone()])
        .expect("second selection succeeds");

    let selections = harness
        .repository
        .selections_for_interview(&interview.id)
        .expect("selections load");
    assert_eq!(selections.len(), 1);
    assert_eq!(selections[0].slot_id, slots[2].id);
}

#[test]
fn confirmation_schedules_the_chosen_slot() {
    let harness = harness();
    let application = submit(&harness);
    let (interview, chosen) = scheduled_interview(&harness, &application);

    assert_eq!(interview.status, InterviewStatus::Scheduled);
    let slot = harness
        .repository
        .fetch_slot(&chosen)
        .expect("lookup works")
        .expect("slot exists");
    assert_eq!(interview.scheduled_at, Some(slot.start_time));

    let introduction = harness
        .repository
        .fetch_introduction(&interview.employer_id, &interview.candidate_id)
        .expect("lookup works")
        .expect("introduction exists");
    assert_eq!(introduction.status, IntroductionStatus::Interviewing);
}

#[test]
fn confirmation_must_pick_a_selected_slot() {
    let harness = harness();
    let application = submit(&harness);
    let interview = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds")
        .entity;
    let slots = harness
        .repository
        .slots_for_interview(&interview.id)
        .expect("slots load");
    harness
        .negotiator
        .select_slots(&candidate_actor(), &interview.id, vec![slots[0].id.clone()])
        .expect("selection succeeds");

    let err = harness
        .negotiator
        .confirm_slot(
            &employer_actor(),
            &interview.id,
            &slots[2].id,
            None,
            now(),
        )
        .expect_err("unselected slot rejected");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn reschedule_archives_the_old_interview_and_links_the_chain() {
    let harness = harness();
    let application = submit(&harness);
    let (first, _slot) = scheduled_interview(&harness, &application);

    harness
        .negotiator
        .request_reschedule(
            &candidate_actor(),
            &first.id,
            "clashes with a final round elsewhere".to_string(),
        )
        .expect("reschedule request succeeds");

    let second = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 2, now())
        .expect("replacement proposal succeeds")
        .entity;

    let archived = harness
        .repository
        .fetch_interview(&first.id)
        .expect("lookup works")
        .expect("interview exists");
    assert_eq!(archived.status, InterviewStatus::Rescheduled);
    assert!(archived.scheduled_at.is_none());
    assert!(!archived.pending_reschedule);
    assert!(archived
        .notes
        .as_deref()
        .map(|notes| notes.contains("clashes with a final round"))
        .unwrap_or(false));

    assert_eq!(second.rescheduled_from.as_ref(), Some(&first.id));
    // Exactly one successor references the archived interview.
    let successors: Vec<_> = harness
        .repository
        .interviews_for_application(&application.id)
        .expect("lookup works")
        .into_iter()
        .filter(|interview| interview.rescheduled_from.as_ref() == Some(&first.id))
        .collect();
    assert_eq!(successors.len(), 1);
}

#[test]
fn reschedule_chains_walk_back_to_a_root() {
    let harness = harness();
    let application = submit(&harness);

    let mut latest = {
        let (interview, _slot) = scheduled_interview(&harness, &application);
        interview
    };
    for round in 2..=4 {
        harness
            .negotiator
            .request_reschedule(&employer_actor(), &latest.id, "shift".to_string())
            .expect("reschedule request succeeds");
        let interview = harness
            .negotiator
            .propose_slots(&employer_actor(), &application.id, windows(), 60, round, now())
            .expect("proposal succeeds")
            .entity;
        let slots = harness
            .repository
            .slots_for_interview(&interview.id)
            .expect("slots load");
        harness
            .negotiator
            .select_slots(&candidate_actor(), &interview.id, vec![slots[0].id.clone()])
            .expect("selection succeeds");
        latest = harness
            .negotiator
            .confirm_slot(&employer_actor(), &interview.id, &slots[0].id, None, now())
            .expect("confirmation succeeds")
            .entity;
    }

    // Follow the chain; it must terminate without cycling.
    let mut hops = 0;
    let mut cursor = latest;
    while let Some(previous) = cursor.rescheduled_from.clone() {
        cursor = harness
            .repository
            .fetch_interview(&previous)
            .expect("lookup works")
            .expect("predecessor exists");
        hops += 1;
        assert!(hops <= 4, "reschedule chain does not terminate");
    }
    assert_eq!(hops, 3);
    assert!(cursor.rescheduled_from.is_none());
}

#[test]
fn completion_moves_the_application_to_interviewed() {
    let harness = harness();
    let application = submit(&harness);
    let (interview, _slot) = scheduled_interview(&harness, &application);

    harness
        .negotiator
        .complete_interview(&employer_actor(), &interview.id, now() + Duration::days(2))
        .expect("completion succeeds");

    let stored = harness
        .repository
        .fetch_application(&application.id)
        .expect("lookup works")
        .expect("application exists");
    assert_eq!(stored.status, ApplicationStatus::Interviewed);
}

#[test]
fn cancellation_clears_the_scheduled_time() {
    let harness = harness();
    let application = submit(&harness);
    let (interview, _slot) = scheduled_interview(&harness, &application);

    let outcome = harness
        .negotiator
        .cancel_interview(
            &employer_actor(),
            &interview.id,
            Some("role on hold".to_string()),
        )
        .expect("cancellation succeeds");

    assert_eq!(outcome.entity.status, InterviewStatus::Cancelled);
    assert!(outcome.entity.scheduled_at.is_none());
}

#[test]
fn attendance_confirmation_requires_a_scheduled_interview() {
    let harness = harness();
    let application = submit(&harness);
    let interview = harness
        .negotiator
        .propose_slots(&employer_actor(), &application.id, windows(), 60, 1, now())
        .expect("proposal succeeds")
        .entity;

    let err = harness
        .negotiator
        .confirm_attendance(&candidate_actor(), &interview.id)
        .expect_err("nothing scheduled yet");
    assert!(matches!(err, PipelineError::Conflict(_)));

    let (scheduled, _slot) = {
        // Walk the remaining protocol on a second application round.
        let slots = harness
            .repository
            .slots_for_interview(&interview.id)
            .expect("slots load");
        harness
            .negotiator
            .select_slots(&candidate_actor(), &interview.id, vec![slots[0].id.clone()])
            .expect("selection succeeds");
        let confirmed = harness
            .negotiator
            .confirm_slot(&employer_actor(), &interview.id, &slots[0].id, None, now())
            .expect("confirmation succeeds")
            .entity;
        (confirmed, slots[0].id.clone())
    };

    let outcome = harness
        .negotiator
        .confirm_attendance(&candidate_actor(), &scheduled.id)
        .expect("attendance confirmation succeeds");
    assert_eq!(outcome.entity.status, InterviewStatus::Confirmed);
}
