//! Coupon redemption state machine.
//!
//! `Generated → Redeemed` is the only stored transition and happens through
//! the store's conditional update. `Expired` is computed at read time from
//! the timestamps and is just as terminal: a past-expiry coupon whose
//! stored status still says `Generated` classifies as `Expired`, never
//! `Valid`.

use chrono::{DateTime, Utc};
use promo_core::types::{Coupon, CouponStatus, Offer};
use promo_store::{CouponStore, StoreError};
use serde::Serialize;

/// Outcome of evaluating a presented code at a point in time.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouponEvaluation {
    Valid,
    AlreadyRedeemed,
    Expired,
    NotFound,
}

/// Outcome of a redeem attempt.
#[derive(Debug, Clone)]
pub enum RedeemOutcome {
    /// The coupon is now permanently `Redeemed`.
    Success(Coupon),
    AlreadyRedeemed,
    Expired,
    NotFound,
}

/// Pure redeemability check, no side effects. A coupon is redeemable iff
/// it is still `Generated`, its own expiry has not passed, and the offer's
/// end date has not passed — both windows, one rule, one place.
pub fn evaluate(lookup: Option<(&Coupon, &Offer)>, now: DateTime<Utc>) -> CouponEvaluation {
    let Some((coupon, offer)) = lookup else {
        return CouponEvaluation::NotFound;
    };
    match coupon.status {
        CouponStatus::Redeemed => CouponEvaluation::AlreadyRedeemed,
        CouponStatus::Expired => CouponEvaluation::Expired,
        CouponStatus::Generated => {
            if coupon.is_expired(now) || now > offer.ends_at {
                CouponEvaluation::Expired
            } else {
                CouponEvaluation::Valid
            }
        }
    }
}

/// The mutating transition. Evaluates first, then attempts the store's
/// compare-and-swap; a lost race surfaces as `AlreadyRedeemed`, so two
/// concurrent calls resolve to exactly one `Success`.
pub fn redeem(
    store: &dyn CouponStore,
    coupon: &Coupon,
    offer: &Offer,
    now: DateTime<Utc>,
) -> Result<RedeemOutcome, StoreError> {
    match evaluate(Some((coupon, offer)), now) {
        CouponEvaluation::Valid => match store.mark_redeemed(coupon.id, now) {
            Ok(updated) => Ok(RedeemOutcome::Success(updated)),
            Err(StoreError::Conflict) => Ok(RedeemOutcome::AlreadyRedeemed),
            Err(e) => Err(e),
        },
        CouponEvaluation::AlreadyRedeemed => Ok(RedeemOutcome::AlreadyRedeemed),
        CouponEvaluation::Expired => Ok(RedeemOutcome::Expired),
        CouponEvaluation::NotFound => Ok(RedeemOutcome::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use promo_core::types::{OfferStatus, OfferTargeting};
    use uuid::Uuid;

    fn offer_ending(ends_at: DateTime<Utc>) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            title: "20% OFF".to_string(),
            description: String::new(),
            weight: 30,
            status: OfferStatus::Active,
            targeting: OfferTargeting::All,
            starts_at: ends_at - Duration::days(30),
            ends_at,
            allotted: 0,
            revealed: 0,
            redemptions: 0,
            created_at: ends_at - Duration::days(30),
        }
    }

    fn coupon(issued_at: DateTime<Utc>, offer: &Offer, status: CouponStatus) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "RESTO-EEEE-0001".to_string(),
            offer_id: offer.id,
            customer_id: Uuid::new_v4(),
            issued_at,
            expires_at: issued_at + Duration::hours(2),
            status,
            redeemed_at: None,
        }
    }

    #[test]
    fn test_evaluate_unknown_code() {
        assert_eq!(evaluate(None, Utc::now()), CouponEvaluation::NotFound);
    }

    #[test]
    fn test_evaluate_validity_boundaries() {
        // Issued at T with 2h validity: valid at T+1h59m, expired at T+2h1m.
        let t = Utc::now();
        let offer = offer_ending(t + Duration::days(7));
        let c = coupon(t, &offer, CouponStatus::Generated);

        assert_eq!(
            evaluate(Some((&c, &offer)), t + Duration::minutes(119)),
            CouponEvaluation::Valid
        );
        assert_eq!(
            evaluate(Some((&c, &offer)), t + Duration::minutes(121)),
            CouponEvaluation::Expired
        );
    }

    #[test]
    fn test_expiry_beats_stale_generated_flag() {
        // Nothing has flipped the stored status, but the clock has.
        let t = Utc::now() - Duration::hours(3);
        let offer = offer_ending(Utc::now() + Duration::days(7));
        let c = coupon(t, &offer, CouponStatus::Generated);

        assert_eq!(evaluate(Some((&c, &offer)), Utc::now()), CouponEvaluation::Expired);
    }

    #[test]
    fn test_offer_end_date_also_gates_redemption() {
        // Coupon itself still inside its 2h window, but the offer ended.
        let now = Utc::now();
        let offer = offer_ending(now - Duration::minutes(5));
        let c = coupon(now - Duration::minutes(30), &offer, CouponStatus::Generated);

        assert!(!c.is_expired(now));
        assert_eq!(evaluate(Some((&c, &offer)), now), CouponEvaluation::Expired);
    }

    #[test]
    fn test_redeemed_is_permanent() {
        let t = Utc::now();
        let offer = offer_ending(t + Duration::days(7));
        let c = coupon(t, &offer, CouponStatus::Redeemed);

        assert_eq!(
            evaluate(Some((&c, &offer)), t + Duration::minutes(1)),
            CouponEvaluation::AlreadyRedeemed
        );
        // Still AlreadyRedeemed after its expiry passes: the terminal
        // distinguishes "used" from "timed out".
        assert_eq!(
            evaluate(Some((&c, &offer)), t + Duration::hours(5)),
            CouponEvaluation::AlreadyRedeemed
        );
    }
}
