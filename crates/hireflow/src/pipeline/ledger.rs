use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorContext, Employer, PaymentMethod, PaymentStatus, Placement, PlacementId,
};
use super::error::PipelineError;
use super::fees::FeeConfig;
use super::repository::{
    NotificationIntent, PaymentIntentRecord, PaymentLeg, PipelineRepository,
};
use super::service::CommandOutcome;

/// Which payment a manual recording settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Upfront,
    Remaining,
    Full,
}

impl PaymentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upfront => "upfront",
            Self::Remaining => "remaining",
            Self::Full => "full",
        }
    }
}

/// Lifecycle of a gateway intent, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPayment,
    Processing,
    Succeeded,
    Canceled,
}

/// A payment intent as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
}

/// Request shape for intent creation. The idempotency key is owned by the
/// durable intent record, so retries after a timeout reuse it.
#[derive(Debug, Clone)]
pub struct CreateIntent {
    pub amount: i64,
    pub currency: String,
    pub customer: String,
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

/// Gateway failure. Timeouts and transport faults are retryable by the
/// caller; a rejection is not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway timed out")]
    Timeout,
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("payment gateway transport failure: {0}")]
    Transport(String),
}

/// External payment collaborator. Implementations enforce a hard call
/// timeout and surface it as `GatewayError::Timeout`; amounts are integer
/// minor-currency units throughout.
pub trait PaymentGateway: Send + Sync {
    fn create_customer(&self, employer: &Employer) -> Result<String, GatewayError>;
    fn create_payment_intent(&self, request: CreateIntent) -> Result<PaymentIntent, GatewayError>;
    fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError>;
}

/// Tracks upfront/remaining payment state for placements and reconciles
/// against gateway intents or manually recorded payments.
pub struct PaymentLedger<R, G> {
    repository: Arc<R>,
    gateway: Arc<G>,
    fees: FeeConfig,
}

impl<R, G> PaymentLedger<R, G>
where
    R: PipelineRepository + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(repository: Arc<R>, gateway: Arc<G>, fees: FeeConfig) -> Self {
        Self {
            repository,
            gateway,
            fees,
        }
    }

    /// Record a payment against a placement. The payment-status
    /// compare-and-swap keeps double recordings and out-of-order legs out
    /// even under concurrent calls; reaching fully paid bumps the
    /// employer's running spend exactly once.
    pub fn record_payment(
        &self,
        actor: &ActorContext,
        placement_id: &PlacementId,
        kind: PaymentKind,
        amount: Option<i64>,
        method: PaymentMethod,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Placement>, PipelineError> {
        let placement = self.require_placement(placement_id)?;
        if !actor.acts_for_employer(&placement.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the billed employer may record payments".to_string(),
            ));
        }

        let (expected, updated) = match kind {
            PaymentKind::Upfront => {
                if placement.upfront_paid_at.is_some() {
                    return Err(PipelineError::Conflict(format!(
                        "upfront payment for placement {} was already recorded",
                        placement.id.0
                    )));
                }
                check_amount(amount, placement.upfront_amount, kind)?;
                let mut updated = placement.clone();
                updated.payment_status = PaymentStatus::UpfrontPaid;
                updated.upfront_paid_at = Some(now);
                updated.upfront_transaction = transaction_id;
                (PaymentStatus::Pending, updated)
            }
            PaymentKind::Remaining => {
                if placement.remaining_paid_at.is_some() {
                    return Err(PipelineError::Conflict(format!(
                        "remaining payment for placement {} was already recorded",
                        placement.id.0
                    )));
                }
                if placement.upfront_paid_at.is_none() {
                    return Err(PipelineError::Validation(
                        "the upfront payment must be recorded before the remainder".to_string(),
                    ));
                }
                check_amount(amount, placement.remaining_amount, kind)?;
                let mut updated = placement.clone();
                updated.payment_status = PaymentStatus::FullyPaid;
                updated.remaining_paid_at = Some(now);
                updated.remaining_transaction = transaction_id;
                (PaymentStatus::UpfrontPaid, updated)
            }
            PaymentKind::Full => {
                if placement.upfront_paid_at.is_some() || placement.remaining_paid_at.is_some() {
                    return Err(PipelineError::Conflict(format!(
                        "placement {} already has a recorded leg; record the remainder instead",
                        placement.id.0
                    )));
                }
                check_amount(amount, placement.placement_fee, kind)?;
                let mut updated = placement.clone();
                updated.payment_status = PaymentStatus::FullyPaid;
                updated.upfront_paid_at = Some(now);
                updated.remaining_paid_at = Some(now);
                updated.upfront_transaction = transaction_id.clone();
                updated.remaining_transaction = transaction_id;
                (PaymentStatus::Pending, updated)
            }
        };

        self.repository
            .transition_placement(&placement.id, expected, updated.clone())?;

        if updated.payment_status == PaymentStatus::FullyPaid {
            // Only the CAS winner reaches this increment.
            let mut employer = self
                .repository
                .fetch_employer(&updated.employer_id)?
                .ok_or_else(|| {
                    PipelineError::NotFound(format!("employer {}", updated.employer_id.0))
                })?;
            employer.total_spent += updated.placement_fee;
            self.repository.update_employer(employer)?;
        }

        let notification = NotificationIntent::new(&updated.employer_id.0, "payment_received")
            .with("placement_id", updated.id.0.clone())
            .with("payment", kind.label())
            .with("method", method_label(method))
            .with("payment_status", updated.payment_status.label());

        Ok(CommandOutcome {
            entity: updated,
            notifications: vec![notification],
        })
    }

    /// Create (or re-fetch) the gateway intent for one leg. The intent
    /// record and its idempotency key are persisted before the gateway is
    /// called, so a timeout leaves payment state untouched and a retry
    /// reuses the same key instead of minting a second intent.
    pub fn create_payment_intent(
        &self,
        actor: &ActorContext,
        placement_id: &PlacementId,
        leg: PaymentLeg,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntent, PipelineError> {
        let placement = self.require_placement(placement_id)?;
        if !actor.acts_for_employer(&placement.employer_id) {
            return Err(PipelineError::Forbidden(
                "only the billed employer may raise payment intents".to_string(),
            ));
        }
        let amount = self.leg_amount(&placement, leg)?;

        if let Some(record) = self.repository.fetch_intent_record(&placement.id, leg)? {
            if let Some(intent_id) = &record.intent_id {
                return Ok(self.gateway.retrieve_payment_intent(intent_id)?);
            }
        }

        let customer = self.ensure_customer(&placement.employer_id)?;
        let mut record = PaymentIntentRecord {
            placement_id: placement.id.clone(),
            leg,
            idempotency_key: format!("pi-{}-{}", placement.id.0, leg.label()),
            intent_id: None,
            amount,
            currency: self.fees.currency.clone(),
            created_at: now,
        };
        self.repository.upsert_intent_record(record.clone())?;

        let mut metadata = BTreeMap::new();
        metadata.insert("placement_id".to_string(), placement.id.0.clone());
        metadata.insert("leg".to_string(), leg.label().to_string());
        let intent = self.gateway.create_payment_intent(CreateIntent {
            amount,
            currency: record.currency.clone(),
            customer,
            idempotency_key: record.idempotency_key.clone(),
            metadata,
        })?;

        record.intent_id = Some(intent.id.clone());
        self.repository.upsert_intent_record(record)?;
        Ok(intent)
    }

    /// Pull the gateway's view of a leg's intent and, when it reports
    /// success for a still-unpaid leg, record the payment with the intent
    /// as the transaction reference.
    pub fn reconcile_intent(
        &self,
        actor: &ActorContext,
        placement_id: &PlacementId,
        leg: PaymentLeg,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome<Placement>, PipelineError> {
        let placement = self.require_placement(placement_id)?;
        let record = self
            .repository
            .fetch_intent_record(&placement.id, leg)?
            .and_then(|record| record.intent_id)
            .ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "no intent on file for placement {} {}",
                    placement.id.0,
                    leg.label()
                ))
            })?;

        let intent = self.gateway.retrieve_payment_intent(&record)?;
        let leg_paid = match leg {
            PaymentLeg::Upfront => placement.upfront_paid_at.is_some(),
            PaymentLeg::Remaining => placement.remaining_paid_at.is_some(),
        };
        if intent.status != IntentStatus::Succeeded || leg_paid {
            return Ok(CommandOutcome::quiet(placement));
        }

        let kind = match leg {
            PaymentLeg::Upfront => PaymentKind::Upfront,
            PaymentLeg::Remaining => PaymentKind::Remaining,
        };
        self.record_payment(
            actor,
            placement_id,
            kind,
            Some(intent.amount),
            PaymentMethod::Card,
            Some(intent.id),
            now,
        )
    }

    fn ensure_customer(
        &self,
        employer_id: &super::domain::EmployerId,
    ) -> Result<String, PipelineError> {
        let employer = self
            .repository
            .fetch_employer(employer_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("employer {}", employer_id.0)))?;
        if let Some(customer) = &employer.gateway_customer {
            return Ok(customer.clone());
        }
        let customer = self.gateway.create_customer(&employer)?;
        let mut updated = employer;
        updated.gateway_customer = Some(customer.clone());
        self.repository.update_employer(updated)?;
        Ok(customer)
    }

    fn leg_amount(&self, placement: &Placement, leg: PaymentLeg) -> Result<i64, PipelineError> {
        match leg {
            PaymentLeg::Upfront => {
                if placement.upfront_paid_at.is_some() {
                    return Err(PipelineError::Conflict(format!(
                        "upfront leg of placement {} is already settled",
                        placement.id.0
                    )));
                }
                Ok(placement.upfront_amount)
            }
            PaymentLeg::Remaining => {
                if placement.remaining_paid_at.is_some() {
                    return Err(PipelineError::Conflict(format!(
                        "remaining leg of placement {} is already settled",
                        placement.id.0
                    )));
                }
                if placement.upfront_paid_at.is_none() {
                    return Err(PipelineError::Validation(
                        "the upfront payment must settle before the remainder is raised"
                            .to_string(),
                    ));
                }
                Ok(placement.remaining_amount)
            }
        }
    }

    fn require_placement(&self, id: &PlacementId) -> Result<Placement, PipelineError> {
        self.repository
            .fetch_placement(id)?
            .ok_or_else(|| PipelineError::NotFound(format!("placement {}", id.0)))
    }
}

fn check_amount(
    amount: Option<i64>,
    expected: i64,
    kind: PaymentKind,
) -> Result<(), PipelineError> {
    if let Some(amount) = amount {
        if amount != expected {
            return Err(PipelineError::Validation(format!(
                "{} payment of {amount} does not match the billed {expected}",
                kind.label()
            )));
        }
    }
    Ok(())
}

const fn method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::BankTransfer => "bank_transfer",
        PaymentMethod::Card => "card",
        PaymentMethod::Check => "check",
    }
}
