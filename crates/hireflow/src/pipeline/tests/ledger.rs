use chrono::Duration;

use super::common::{
    accept_offer, admin_actor, employer_actor, harness, now, submitted_offer, Harness,
};
use crate::pipeline::domain::{PaymentMethod, PaymentStatus, Placement};
use crate::pipeline::error::PipelineError;
use crate::pipeline::ledger::{GatewayError, IntentStatus, PaymentKind};
use crate::pipeline::repository::{PaymentLeg, PipelineRepository};

fn placed(harness: &Harness) -> Placement {
    let (_application, offer) = submitted_offer(harness);
    accept_offer(harness, &offer)
}

#[test]
fn upfront_then_remaining_reaches_fully_paid_and_counts_spend_once() {
    let harness = harness();
    let placement = placed(&harness);

    let after_upfront = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Upfront,
            Some(placement.upfront_amount),
            PaymentMethod::BankTransfer,
            Some("wire-771".to_string()),
            now(),
        )
        .expect("upfront records")
        .entity;
    assert_eq!(after_upfront.payment_status, PaymentStatus::UpfrontPaid);
    assert!(after_upfront.upfront_paid_at.is_some());

    let employer = harness
        .repository
        .fetch_employer(&placement.employer_id)
        .expect("lookup works")
        .expect("employer exists");
    assert_eq!(employer.total_spent, 0);

    let settled = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Remaining,
            Some(placement.remaining_amount),
            PaymentMethod::BankTransfer,
            Some("wire-772".to_string()),
            now() + Duration::days(20),
        )
        .expect("remaining records")
        .entity;
    assert_eq!(settled.payment_status, PaymentStatus::FullyPaid);

    let employer = harness
        .repository
        .fetch_employer(&placement.employer_id)
        .expect("lookup works")
        .expect("employer exists");
    assert_eq!(employer.total_spent, placement.placement_fee);
}

#[test]
fn remaining_before_upfront_is_rejected() {
    let harness = harness();
    let placement = placed(&harness);

    let err = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Remaining,
            None,
            PaymentMethod::BankTransfer,
            None,
            now(),
        )
        .expect_err("remaining needs upfront first");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn double_upfront_conflicts() {
    let harness = harness();
    let placement = placed(&harness);

    harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Upfront,
            None,
            PaymentMethod::Card,
            None,
            now(),
        )
        .expect("first upfront records");

    let err = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Upfront,
            None,
            PaymentMethod::Card,
            None,
            now(),
        )
        .expect_err("second upfront conflicts");
    assert!(matches!(err, PipelineError::Conflict(_)));
}

#[test]
fn full_payment_settles_both_legs_at_once() {
    let harness = harness();
    let placement = placed(&harness);

    let settled = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Full,
            Some(placement.placement_fee),
            PaymentMethod::BankTransfer,
            Some("wire-800".to_string()),
            now(),
        )
        .expect("full payment records")
        .entity;

    assert_eq!(settled.payment_status, PaymentStatus::FullyPaid);
    assert!(settled.upfront_paid_at.is_some());
    assert!(settled.remaining_paid_at.is_some());

    let err = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Full,
            None,
            PaymentMethod::BankTransfer,
            None,
            now(),
        )
        .expect_err("already settled");
    assert!(matches!(err, PipelineError::Conflict(_)));
}

#[test]
fn full_payment_after_upfront_conflicts() {
    let harness = harness();
    let placement = placed(&harness);

    harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Upfront,
            None,
            PaymentMethod::Card,
            None,
            now(),
        )
        .expect("upfront records");

    let err = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Full,
            None,
            PaymentMethod::Card,
            None,
            now(),
        )
        .expect_err("full after upfront conflicts");
    assert!(matches!(err, PipelineError::Conflict(_)));
}

#[test]
fn mismatched_amount_is_a_validation_failure() {
    let harness = harness();
    let placement = placed(&harness);

    let err = harness
        .ledger
        .record_payment(
            &employer_actor(),
            &placement.id,
            PaymentKind::Upfront,
            Some(placement.upfront_amount - 1),
            PaymentMethod::BankTransfer,
            None,
            now(),
        )
        .expect_err("short payment rejected");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn foreign_employer_cannot_record_payments() {
    let harness = harness();
    let placement = placed(&harness);

    let outsider = crate::pipeline::domain::ActorContext::employer("emp-999");
    let err = harness
        .ledger
        .record_payment(
            &outsider,
            &placement.id,
            PaymentKind::Upfront,
            None,
            PaymentMethod::Card,
            None,
            now(),
        )
        .expect_err("outsider rejected");
    assert!(matches!(err, PipelineError::Forbidden(_)));
}

#[test]
fn intent_creation_is_idempotent_across_a_timeout() {
    let harness = harness();
    let placement = placed(&harness);

    harness.gateway.fail_next(GatewayError::Timeout);
    let err = harness
        .ledger
        .create_payment_intent(&employer_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect_err("first attempt times out");
    assert!(matches!(err, PipelineError::Gateway(GatewayError::Timeout)));

    // Payment state is untouched by the failed attempt.
    let stored = harness
        .repository
        .fetch_placement(&placement.id)
        .expect("lookup works")
        .expect("placement exists");
    assert_eq!(stored.payment_status, PaymentStatus::Pending);

    // The retry reuses the persisted idempotency key.
    let intent = harness
        .ledger
        .create_payment_intent(&employer_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect("retry succeeds");
    assert_eq!(intent.amount, placement.upfront_amount);
    assert_eq!(intent.status, IntentStatus::RequiresPayment);

    let record = harness
        .repository
        .fetch_intent_record(&placement.id, PaymentLeg::Upfront)
        .expect("lookup works")
        .expect("record persisted");
    assert_eq!(record.intent_id.as_deref(), Some(intent.id.as_str()));

    // A further call returns the same intent rather than minting another.
    let again = harness
        .ledger
        .create_payment_intent(&employer_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect("repeat fetch succeeds");
    assert_eq!(again.id, intent.id);
}

#[test]
fn customer_reference_is_created_once_and_reused() {
    let harness = harness();
    let placement = placed(&harness);

    harness
        .ledger
        .create_payment_intent(&employer_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect("intent creates");

    let employer = harness
        .repository
        .fetch_employer(&placement.employer_id)
        .expect("lookup works")
        .expect("employer exists");
    let reference = employer.gateway_customer.clone().expect("customer stored");
    assert_eq!(reference, format!("cus-{}", placement.employer_id.0));
}

#[test]
fn reconciliation_records_a_succeeded_intent() {
    let harness = harness();
    let placement = placed(&harness);

    let intent = harness
        .ledger
        .create_payment_intent(&employer_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect("intent creates");
    harness.gateway.settle_intent(&intent.id);

    let outcome = harness
        .ledger
        .reconcile_intent(&admin_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect("reconciliation succeeds");

    assert_eq!(outcome.entity.payment_status, PaymentStatus::UpfrontPaid);
    assert_eq!(
        outcome.entity.upfront_transaction.as_deref(),
        Some(intent.id.as_str())
    );

    // Reconciliation of an already-recorded leg is a quiet no-op.
    let repeat = harness
        .ledger
        .reconcile_intent(&admin_actor(), &placement.id, PaymentLeg::Upfront, now())
        .expect("repeat reconciliation is quiet");
    assert!(repeat.notifications.is_empty());
}

#[test]
fn remaining_intent_requires_the_upfront_leg_settled() {
    let harness = harness();
    let placement = placed(&harness);

    let err = harness
        .ledger
        .create_payment_intent(
            &employer_actor(),
            &placement.id,
            PaymentLeg::Remaining,
            now(),
        )
        .expect_err("remaining intent too early");
    assert!(matches!(err, PipelineError::Validation(_)));
}
