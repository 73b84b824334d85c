//! Promotion domain types — offers, coupons, customers.
//!
//! The lifecycle these types carry:
//! - an Offer is a staff-defined promotion with a selection weight
//! - a Coupon is the unit a customer holds after a scratch draw
//! - a Customer is keyed by phone number and accumulates visit history

use crate::config::PromoConfig;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Offers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Inactive,
}

/// Which customers an offer may be drawn by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferTargeting {
    /// All registered customers.
    All,
    /// First-visit customers.
    New,
    /// Regulars at or above the visit threshold.
    Frequent,
    /// Customers with no visit in the inactivity window.
    Inactive,
}

impl OfferTargeting {
    /// Whether a customer's profile falls inside this targeting predicate.
    pub fn matches(&self, customer: &Customer, now: DateTime<Utc>, config: &PromoConfig) -> bool {
        match self {
            OfferTargeting::All => true,
            OfferTargeting::New => customer.visit_count <= 1,
            OfferTargeting::Frequent => customer.visit_count >= config.frequent_visit_threshold,
            OfferTargeting::Inactive => {
                (now - customer.last_visit_at).num_days() >= config.inactive_days_threshold as i64
            }
        }
    }
}

/// A promotion definition. Created by staff; immutable once coupons
/// reference it, except for the status flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Selection weight for the scratch draw. Zero means "never drawn"
    /// unless every candidate is zero, in which case selection is uniform.
    pub weight: u32,
    pub status: OfferStatus,
    pub targeting: OfferTargeting,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Coupons issued against this offer.
    pub allotted: u64,
    /// Scratch reveals completed.
    pub revealed: u64,
    /// Coupons redeemed at the terminal.
    pub redemptions: u64,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Active and inside its validity window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Active && self.starts_at <= now && now <= self.ends_at
    }
}

/// Staff request to create an offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDraft {
    pub title: String,
    pub description: String,
    pub weight: u32,
    pub targeting: OfferTargeting,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

// ─── Coupons ────────────────────────────────────────────────────────────────

/// Coupon lifecycle state. `Expired` is computed from the timestamps at
/// read time; the store never writes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Generated,
    Redeemed,
    Expired,
}

impl CouponStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CouponStatus::Redeemed | CouponStatus::Expired)
    }
}

/// The unit a customer holds after a scratch draw. Mutated exactly once,
/// by a successful redeem (Generated → Redeemed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    /// Unique, human-shareable, URL/SMS-safe code.
    pub code: String,
    pub offer_id: Uuid,
    pub customer_id: Uuid,
    pub issued_at: DateTime<Utc>,
    /// `issued_at` + the configured validity duration. Independent of the
    /// offer's own end date; redemption requires both.
    pub expires_at: DateTime<Utc>,
    pub status: CouponStatus,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Calendar date of issuance in the business reporting timezone.
    /// The one-draw-per-day rule keys on this date.
    pub fn issued_on(&self, tz: FixedOffset) -> NaiveDate {
        self.issued_at.with_timezone(&tz).date_naive()
    }
}

// ─── Customers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// A loyalty customer, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub food_preference: Option<String>,
    pub alcohol_preference: Option<String>,
    pub visit_count: u32,
    pub last_visit_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

/// Registration form payload. Re-registering an existing phone number
/// counts a visit instead of creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRegistration {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub food_preference: Option<String>,
    #[serde(default)]
    pub alcohol_preference: Option<String>,
}
