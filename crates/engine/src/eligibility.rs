//! Daily-quota gate and candidate filtering for the scratch draw.
//!
//! The gate keys on "a coupon was issued today" in the business reporting
//! timezone — a coupon that was redeemed or timed out earlier today still
//! blocks a second draw until the calendar date rolls over.

use crate::engine::DrawError;
use chrono::{DateTime, Utc};
use promo_core::config::PromoConfig;
use promo_core::types::{Coupon, Customer, Offer};
use promo_store::CouponStore;
use std::sync::Arc;

pub struct EligibilityGate {
    store: Arc<dyn CouponStore>,
    config: PromoConfig,
}

impl EligibilityGate {
    pub fn new(store: Arc<dyn CouponStore>, config: &PromoConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    /// Run the full gate: daily quota, then candidate filtering. Returns
    /// the non-empty candidate set the selector may draw from.
    ///
    /// The authoritative "has drawn today" signal is a single store query,
    /// not a client-side history scan, so the answer cannot diverge from
    /// persisted state.
    pub fn check(&self, customer: &Customer, now: DateTime<Utc>) -> Result<Vec<Offer>, DrawError> {
        let tz = self.config.reporting_offset();
        if self.store.find_today_coupon(customer.id, now, tz)?.is_some() {
            return Err(DrawError::DailyLimitReached);
        }

        let candidates = self.store.find_offers_eligible_for(customer, now)?;
        if candidates.is_empty() {
            return Err(DrawError::NoEligibleOffers);
        }
        Ok(candidates)
    }
}

/// Pure form of the daily-quota rule over a coupon history slice. The
/// engine path goes through [`EligibilityGate::check`]; this is the same
/// predicate for callers that already hold the history.
pub fn issued_today(
    history: &[Coupon],
    now: DateTime<Utc>,
    tz: chrono::FixedOffset,
) -> Option<&Coupon> {
    let today = now.with_timezone(&tz).date_naive();
    history.iter().find(|c| c.issued_on(tz) == today)
}
