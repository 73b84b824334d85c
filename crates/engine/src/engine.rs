//! Draw orchestration: gate → weighted selection → coupon minting.
//!
//! The draw path is serialized per customer through a keyed lock registry,
//! and the daily gate runs inside the critical section — a double-tapped
//! draw button resolves to one coupon and one `DailyLimitReached`.

use crate::eligibility::EligibilityGate;
use crate::issuer::CouponIssuer;
use crate::selector;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use promo_core::config::PromoConfig;
use promo_store::{CouponStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Expected, customer-facing draw denials plus the store passthrough.
#[derive(Error, Debug)]
pub enum DrawError {
    #[error("customer not found")]
    CustomerNotFound,

    #[error("daily scratch limit reached")]
    DailyLimitReached,

    #[error("no offers available")]
    NoEligibleOffers,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the customer's scratch card reveals: the coupon is already
/// persisted before any reveal animation runs.
#[derive(Debug, Clone)]
pub struct ScratchCard {
    pub coupon: promo_core::types::Coupon,
    pub offer: promo_core::types::Offer,
}

pub struct ScratchEngine {
    store: Arc<dyn CouponStore>,
    gate: EligibilityGate,
    issuer: CouponIssuer,
    /// Per-customer draw serialization. Keyed locks, not a global one.
    draw_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ScratchEngine {
    pub fn new(store: Arc<dyn CouponStore>, config: &PromoConfig) -> Self {
        info!(
            validity_minutes = config.validity_minutes,
            code_prefix = %config.code_prefix,
            "Scratch engine initialized"
        );
        Self {
            gate: EligibilityGate::new(store.clone(), config),
            issuer: CouponIssuer::new(store.clone(), config),
            store,
            draw_locks: DashMap::new(),
        }
    }

    /// The issuance path: eligibility gate, weighted selection, coupon
    /// minting. Returns the scratch card to reveal.
    pub fn draw(&self, customer_id: Uuid, now: DateTime<Utc>) -> Result<ScratchCard, DrawError> {
        let customer = self
            .store
            .get_customer(customer_id)?
            .ok_or(DrawError::CustomerNotFound)?;

        let lock = self
            .draw_locks
            .entry(customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        // Gate runs under the lock: a concurrent winner's coupon is
        // visible here, so the loser gets DailyLimitReached.
        let candidates = self.gate.check(&customer, now)?;
        let offer = selector::pick_weighted(&candidates, &mut rand::thread_rng())
            .ok_or(DrawError::NoEligibleOffers)?
            .clone();

        let coupon = self.issuer.issue(&customer, &offer, now)?;
        debug!(
            customer_id = %customer_id,
            offer_title = %offer.title,
            code = %coupon.code,
            "Scratch draw completed"
        );
        Ok(ScratchCard { coupon, offer })
    }

    /// Scratch-completion ping. The coupon already exists; this only bumps
    /// the offer's revealed counter for reporting.
    pub fn reveal(&self, code: &str) -> Result<(), DrawError> {
        let coupon = self
            .store
            .find_coupon_by_code(code)?
            .ok_or(DrawError::Store(StoreError::NotFound("coupon")))?;
        self.store.increment_offer_revealed(coupon.offer_id)?;
        metrics::counter!("promo.reveals").increment(1);
        Ok(())
    }
}
