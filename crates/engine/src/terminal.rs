//! Staff redemption terminal: the validate → confirm → redeem protocol.
//!
//! Validate is read-only and safe to repeat; Redeem re-validates
//! server-side before mutating, so a stale Validate response can never
//! authorize a redemption on its own.

use crate::redemption::{self, CouponEvaluation, RedeemOutcome};
use chrono::{DateTime, Utc};
use promo_core::types::{Coupon, Customer, Offer};
use promo_store::{CouponStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Display-ready projection returned for every Validate call, whatever
/// the outcome. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub code: String,
    pub evaluation: CouponEvaluation,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub offer_id: Option<Uuid>,
    pub offer_title: Option<String>,
    pub revealed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub offer_ends_at: Option<DateTime<Utc>>,
    /// Operator-facing explanation when not valid.
    pub message: Option<String>,
}

/// Operator-confirmed redeem request. The ids echo what Validate showed
/// and the operator approved; they are cross-checked against the stored
/// coupon, never trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    pub customer_id: Uuid,
    pub offer_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemReceipt {
    pub code: String,
    pub customer_id: Uuid,
    pub customer_name: Option<String>,
    pub offer_id: Uuid,
    pub offer_title: String,
    pub redeemed_at: DateTime<Utc>,
}

/// Typed rejection reasons. Each carries its own operator message so the
/// terminal never shows a generic failure for a known cause.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RedeemRejection {
    NotFound,
    AlreadyRedeemed,
    Expired,
    /// Confirmed customer/offer ids do not match the stored coupon.
    IdentityMismatch,
}

impl RedeemRejection {
    pub fn message(&self) -> &'static str {
        match self {
            RedeemRejection::NotFound => "Invalid or Expired Code",
            RedeemRejection::AlreadyRedeemed => "Coupon has already been redeemed",
            RedeemRejection::Expired => "Coupon has expired",
            RedeemRejection::IdentityMismatch => "Confirmation does not match this coupon",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TerminalRedeemOutcome {
    Redeemed(RedeemReceipt),
    Rejected(RedeemRejection),
}

pub struct RedemptionTerminal {
    store: Arc<dyn CouponStore>,
}

impl RedemptionTerminal {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Step 1: look up the code and evaluate it. Read-only; calling this
    /// any number of times changes nothing.
    pub fn validate(&self, code: &str, now: DateTime<Utc>) -> Result<ValidationResult, StoreError> {
        let lookup = self.lookup(code)?;
        let evaluation = redemption::evaluate(lookup.as_ref().map(|(c, o)| (c, o)), now);
        metrics::counter!(
            "promo.terminal.validations",
            "result" => format!("{evaluation:?}")
        )
        .increment(1);

        let Some((coupon, offer)) = lookup else {
            return Ok(ValidationResult::unknown_code(code));
        };
        let customer = self.store.get_customer(coupon.customer_id)?;
        Ok(ValidationResult::project(&coupon, &offer, customer.as_ref(), evaluation))
    }

    /// Step 2: redeem after operator confirmation. Re-validates against
    /// the store before mutating; the earlier Validate result carries no
    /// authority here.
    pub fn redeem(
        &self,
        request: &RedeemRequest,
        now: DateTime<Utc>,
    ) -> Result<TerminalRedeemOutcome, StoreError> {
        let Some((coupon, offer)) = self.lookup(&request.code)? else {
            return Ok(TerminalRedeemOutcome::Rejected(RedeemRejection::NotFound));
        };

        if coupon.customer_id != request.customer_id || coupon.offer_id != request.offer_id {
            warn!(
                code = %request.code,
                confirmed_customer = %request.customer_id,
                confirmed_offer = %request.offer_id,
                "Redeem confirmation mismatch"
            );
            return Ok(TerminalRedeemOutcome::Rejected(
                RedeemRejection::IdentityMismatch,
            ));
        }

        match redemption::redeem(self.store.as_ref(), &coupon, &offer, now)? {
            RedeemOutcome::Success(updated) => {
                self.store.increment_offer_redemptions(offer.id)?;
                // Redeeming at the counter is a visit.
                self.store.increment_customer_visit(updated.customer_id, now)?;
                let customer = self.store.get_customer(updated.customer_id)?;
                info!(
                    code = %updated.code,
                    customer_id = %updated.customer_id,
                    offer_id = %offer.id,
                    "Coupon redeemed"
                );
                metrics::counter!("promo.redemptions").increment(1);
                Ok(TerminalRedeemOutcome::Redeemed(RedeemReceipt {
                    code: updated.code.clone(),
                    customer_id: updated.customer_id,
                    customer_name: customer.map(|c| c.name),
                    offer_id: offer.id,
                    offer_title: offer.title.clone(),
                    redeemed_at: updated.redeemed_at.unwrap_or(now),
                }))
            }
            RedeemOutcome::AlreadyRedeemed => Ok(TerminalRedeemOutcome::Rejected(
                RedeemRejection::AlreadyRedeemed,
            )),
            RedeemOutcome::Expired => {
                Ok(TerminalRedeemOutcome::Rejected(RedeemRejection::Expired))
            }
            RedeemOutcome::NotFound => {
                Ok(TerminalRedeemOutcome::Rejected(RedeemRejection::NotFound))
            }
        }
    }

    fn lookup(&self, code: &str) -> Result<Option<(Coupon, Offer)>, StoreError> {
        let Some(coupon) = self.store.find_coupon_by_code(code)? else {
            return Ok(None);
        };
        let Some(offer) = self.store.get_offer(coupon.offer_id)? else {
            // Dangling offer reference; treat as unknown rather than guess
            // at a validity window.
            return Ok(None);
        };
        Ok(Some((coupon, offer)))
    }
}

impl ValidationResult {
    fn unknown_code(code: &str) -> Self {
        Self {
            is_valid: false,
            code: code.to_string(),
            evaluation: CouponEvaluation::NotFound,
            customer_id: None,
            customer_name: None,
            customer_phone: None,
            offer_id: None,
            offer_title: None,
            revealed_at: None,
            expires_at: None,
            offer_ends_at: None,
            message: Some(RedeemRejection::NotFound.message().to_string()),
        }
    }

    fn project(
        coupon: &Coupon,
        offer: &Offer,
        customer: Option<&Customer>,
        evaluation: CouponEvaluation,
    ) -> Self {
        let message = match evaluation {
            CouponEvaluation::Valid => None,
            CouponEvaluation::AlreadyRedeemed => {
                Some(RedeemRejection::AlreadyRedeemed.message().to_string())
            }
            CouponEvaluation::Expired => Some(RedeemRejection::Expired.message().to_string()),
            CouponEvaluation::NotFound => Some(RedeemRejection::NotFound.message().to_string()),
        };
        Self {
            is_valid: evaluation == CouponEvaluation::Valid,
            code: coupon.code.clone(),
            evaluation,
            customer_id: Some(coupon.customer_id),
            customer_name: customer.map(|c| c.name.clone()),
            customer_phone: customer.map(|c| c.phone.clone()),
            offer_id: Some(offer.id),
            offer_title: Some(offer.title.clone()),
            revealed_at: Some(coupon.issued_at),
            expires_at: Some(coupon.expires_at),
            offer_ends_at: Some(offer.ends_at),
            message,
        }
    }
}
