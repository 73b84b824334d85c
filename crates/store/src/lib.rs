//! Backing-store contract for the promotion lifecycle.
//!
//! The engine treats persistence as a black-box collaborator behind the
//! [`CouponStore`] trait. [`MemoryStore`] is the in-process reference
//! implementation used for development and testing.

pub mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, FixedOffset, Utc};
use promo_core::types::{
    Coupon, Customer, CustomerRegistration, Offer, OfferDraft, OfferStatus,
};
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Coupon code already exists. The issuer regenerates on this.
    #[error("duplicate coupon code")]
    DuplicateCode,

    /// Conditional update lost: the coupon was no longer `Generated`.
    #[error("coupon already redeemed")]
    Conflict,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Connectivity-class failure. Surfaced to the caller as a
    /// retry-by-user-action error, never retried implicitly.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Logical operations the promotion core depends on. Implementations must
/// enforce coupon-code uniqueness on insert and compare-and-swap semantics
/// on redeem.
pub trait CouponStore: Send + Sync {
    // ── Offers ──
    fn create_offer(&self, draft: OfferDraft, now: DateTime<Utc>) -> StoreResult<Offer>;
    fn get_offer(&self, id: Uuid) -> StoreResult<Option<Offer>>;
    fn list_offers(&self) -> StoreResult<Vec<Offer>>;
    fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> StoreResult<Offer>;
    /// Live offers whose targeting predicate matches the customer profile.
    fn find_offers_eligible_for(
        &self,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Offer>>;
    fn increment_offer_revealed(&self, offer_id: Uuid) -> StoreResult<()>;
    fn increment_offer_redemptions(&self, offer_id: Uuid) -> StoreResult<()>;

    // ── Customers ──
    /// Create by phone number, or bump the visit counter if the phone is
    /// already registered.
    fn upsert_customer(
        &self,
        registration: CustomerRegistration,
        now: DateTime<Utc>,
    ) -> StoreResult<Customer>;
    fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
    fn find_customer_by_phone(&self, phone: &str) -> StoreResult<Option<Customer>>;
    fn list_customers(&self) -> StoreResult<Vec<Customer>>;
    fn increment_customer_visit(&self, customer_id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    // ── Coupons ──
    /// Insert a freshly minted coupon. Fails with [`StoreError::DuplicateCode`]
    /// when the code is taken; never overwrites.
    fn insert_coupon(&self, coupon: Coupon) -> StoreResult<Coupon>;
    fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;
    /// The coupon (if any) this customer drew on the current calendar date
    /// in the business reporting timezone.
    fn find_today_coupon(
        &self,
        customer_id: Uuid,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> StoreResult<Option<Coupon>>;
    /// Conditional `Generated → Redeemed` transition. Fails with
    /// [`StoreError::Conflict`] when the coupon is no longer `Generated`,
    /// so concurrent redeems resolve to exactly one success.
    fn mark_redeemed(&self, coupon_id: Uuid, now: DateTime<Utc>) -> StoreResult<Coupon>;
    /// Coupon history for a customer, newest first.
    fn coupon_history(&self, customer_id: Uuid) -> StoreResult<Vec<Coupon>>;
}
