//! In-memory store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.
//! This provides the same API surface for development and testing.

use crate::{CouponStore, StoreError, StoreResult};
use chrono::{DateTime, FixedOffset, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use promo_core::config::PromoConfig;
use promo_core::types::{
    Coupon, Customer, CustomerRegistration, Offer, OfferDraft, OfferStatus,
};
use tracing::info;
use uuid::Uuid;

/// Thread-safe in-memory store for offers, customers, and coupons.
pub struct MemoryStore {
    offers: DashMap<Uuid, Offer>,
    customers: DashMap<Uuid, Customer>,
    /// phone → customer id. Phone is the natural key for registration.
    phone_index: DashMap<String, Uuid>,
    coupons: DashMap<Uuid, Coupon>,
    /// code → coupon id. The entry claim here is what makes code
    /// uniqueness atomic.
    code_index: DashMap<String, Uuid>,
    config: PromoConfig,
}

impl MemoryStore {
    pub fn new(config: &PromoConfig) -> Self {
        info!("Promo store initialized (in-memory, development mode)");
        Self {
            offers: DashMap::new(),
            customers: DashMap::new(),
            phone_index: DashMap::new(),
            coupons: DashMap::new(),
            code_index: DashMap::new(),
            config: config.clone(),
        }
    }

    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&PromoConfig::default())
    }
}

impl CouponStore for MemoryStore {
    // ── Offers ──

    fn create_offer(&self, draft: OfferDraft, now: DateTime<Utc>) -> StoreResult<Offer> {
        let offer = Offer {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            weight: draft.weight,
            status: OfferStatus::Active,
            targeting: draft.targeting,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            allotted: 0,
            revealed: 0,
            redemptions: 0,
            created_at: now,
        };
        self.offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    fn get_offer(&self, id: Uuid) -> StoreResult<Option<Offer>> {
        Ok(self.offers.get(&id).map(|r| r.value().clone()))
    }

    fn list_offers(&self) -> StoreResult<Vec<Offer>> {
        let mut offers: Vec<Offer> = self.offers.iter().map(|r| r.value().clone()).collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(offers)
    }

    fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> StoreResult<Offer> {
        self.offers
            .get_mut(&id)
            .map(|mut entry| {
                entry.value_mut().status = status;
                entry.value().clone()
            })
            .ok_or(StoreError::NotFound("offer"))
    }

    fn find_offers_eligible_for(
        &self,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Offer>> {
        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|r| {
                let offer = r.value();
                offer.is_live(now) && offer.targeting.matches(customer, now, &self.config)
            })
            .map(|r| r.value().clone())
            .collect();
        offers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(offers)
    }

    fn increment_offer_revealed(&self, offer_id: Uuid) -> StoreResult<()> {
        let mut entry = self
            .offers
            .get_mut(&offer_id)
            .ok_or(StoreError::NotFound("offer"))?;
        entry.value_mut().revealed += 1;
        Ok(())
    }

    fn increment_offer_redemptions(&self, offer_id: Uuid) -> StoreResult<()> {
        let mut entry = self
            .offers
            .get_mut(&offer_id)
            .ok_or(StoreError::NotFound("offer"))?;
        entry.value_mut().redemptions += 1;
        Ok(())
    }

    // ── Customers ──

    fn upsert_customer(
        &self,
        registration: CustomerRegistration,
        now: DateTime<Utc>,
    ) -> StoreResult<Customer> {
        match self.phone_index.entry(registration.phone.clone()) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                drop(existing);
                self.increment_customer_visit(id, now)?;
                self.customers
                    .get(&id)
                    .map(|r| r.value().clone())
                    .ok_or(StoreError::NotFound("customer"))
            }
            Entry::Vacant(slot) => {
                let customer = Customer {
                    id: Uuid::new_v4(),
                    phone: registration.phone,
                    name: registration.name,
                    email: registration.email,
                    dob: registration.dob,
                    gender: registration.gender,
                    food_preference: registration.food_preference,
                    alcohol_preference: registration.alcohol_preference,
                    visit_count: 1,
                    last_visit_at: now,
                    registered_at: now,
                };
                self.customers.insert(customer.id, customer.clone());
                slot.insert(customer.id);
                Ok(customer)
            }
        }
    }

    fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.customers.get(&id).map(|r| r.value().clone()))
    }

    fn find_customer_by_phone(&self, phone: &str) -> StoreResult<Option<Customer>> {
        let Some(id) = self.phone_index.get(phone).map(|r| *r.value()) else {
            return Ok(None);
        };
        self.get_customer(id)
    }

    fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let mut customers: Vec<Customer> =
            self.customers.iter().map(|r| r.value().clone()).collect();
        customers.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        Ok(customers)
    }

    fn increment_customer_visit(&self, customer_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut entry = self
            .customers
            .get_mut(&customer_id)
            .ok_or(StoreError::NotFound("customer"))?;
        let customer = entry.value_mut();
        customer.visit_count += 1;
        customer.last_visit_at = now;
        Ok(())
    }

    // ── Coupons ──

    fn insert_coupon(&self, coupon: Coupon) -> StoreResult<Coupon> {
        match self.code_index.entry(coupon.code.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateCode),
            Entry::Vacant(slot) => {
                slot.insert(coupon.id);
            }
        }
        if let Some(mut offer) = self.offers.get_mut(&coupon.offer_id) {
            offer.value_mut().allotted += 1;
        }
        self.coupons.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }

    fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let Some(id) = self.code_index.get(code).map(|r| *r.value()) else {
            return Ok(None);
        };
        Ok(self.coupons.get(&id).map(|r| r.value().clone()))
    }

    fn find_today_coupon(
        &self,
        customer_id: Uuid,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> StoreResult<Option<Coupon>> {
        let today = now.with_timezone(&tz).date_naive();
        Ok(self
            .coupons
            .iter()
            .filter(|r| {
                let c = r.value();
                c.customer_id == customer_id && c.issued_on(tz) == today
            })
            .map(|r| r.value().clone())
            .max_by_key(|c| c.issued_at))
    }

    fn mark_redeemed(&self, coupon_id: Uuid, now: DateTime<Utc>) -> StoreResult<Coupon> {
        let mut entry = self
            .coupons
            .get_mut(&coupon_id)
            .ok_or(StoreError::NotFound("coupon"))?;
        let coupon = entry.value_mut();
        // get_mut holds the shard lock, so the status check and the write
        // are one atomic step: exactly one caller wins.
        if coupon.status != promo_core::types::CouponStatus::Generated {
            return Err(StoreError::Conflict);
        }
        coupon.status = promo_core::types::CouponStatus::Redeemed;
        coupon.redeemed_at = Some(now);
        Ok(coupon.clone())
    }

    fn coupon_history(&self, customer_id: Uuid) -> StoreResult<Vec<Coupon>> {
        let mut history: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|r| r.value().customer_id == customer_id)
            .map(|r| r.value().clone())
            .collect();
        history.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use promo_core::types::{CouponStatus, OfferTargeting};
    use std::sync::Arc;

    fn registration(phone: &str) -> CustomerRegistration {
        CustomerRegistration {
            name: "Ravi".to_string(),
            phone: phone.to_string(),
            email: None,
            dob: None,
            gender: None,
            food_preference: None,
            alcohol_preference: None,
        }
    }

    fn draft(title: &str, weight: u32, targeting: OfferTargeting) -> OfferDraft {
        let now = Utc::now();
        OfferDraft {
            title: title.to_string(),
            description: String::new(),
            weight,
            targeting,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(30),
        }
    }

    fn coupon_for(offer_id: Uuid, customer_id: Uuid, code: &str, issued_at: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: code.to_string(),
            offer_id,
            customer_id,
            issued_at,
            expires_at: issued_at + Duration::hours(2),
            status: CouponStatus::Generated,
            redeemed_at: None,
        }
    }

    #[test]
    fn test_upsert_same_phone_bumps_visit() {
        let store = MemoryStore::default();
        let now = Utc::now();

        let first = store.upsert_customer(registration("5550101"), now).unwrap();
        assert_eq!(first.visit_count, 1);

        let second = store
            .upsert_customer(registration("5550101"), now + Duration::days(1))
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.visit_count, 2);
        assert_eq!(store.list_customers().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_coupon_rejects_duplicate_code() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let offer = store.create_offer(draft("10% OFF", 50, OfferTargeting::All), now).unwrap();
        let customer = store.upsert_customer(registration("5550102"), now).unwrap();

        store
            .insert_coupon(coupon_for(offer.id, customer.id, "RESTO-AAAA-0001", now))
            .unwrap();
        let err = store
            .insert_coupon(coupon_for(offer.id, customer.id, "RESTO-AAAA-0001", now))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode));

        // The original coupon is untouched.
        let stored = store.find_coupon_by_code("RESTO-AAAA-0001").unwrap().unwrap();
        assert_eq!(stored.customer_id, customer.id);
        assert_eq!(store.get_offer(offer.id).unwrap().unwrap().allotted, 1);
    }

    #[test]
    fn test_mark_redeemed_is_compare_and_swap() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let offer = store.create_offer(draft("20% OFF", 30, OfferTargeting::All), now).unwrap();
        let customer = store.upsert_customer(registration("5550103"), now).unwrap();
        let coupon = store
            .insert_coupon(coupon_for(offer.id, customer.id, "RESTO-BBBB-0001", now))
            .unwrap();

        let redeemed = store.mark_redeemed(coupon.id, now).unwrap();
        assert_eq!(redeemed.status, CouponStatus::Redeemed);
        assert_eq!(redeemed.redeemed_at, Some(now));

        let err = store.mark_redeemed(coupon.id, now).unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[test]
    fn test_concurrent_mark_redeemed_single_winner() {
        let store = Arc::new(MemoryStore::default());
        let now = Utc::now();
        let offer = store.create_offer(draft("50% OFF", 5, OfferTargeting::All), now).unwrap();
        let customer = store.upsert_customer(registration("5550104"), now).unwrap();
        let coupon = store
            .insert_coupon(coupon_for(offer.id, customer.id, "RESTO-CCCC-0001", now))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = coupon.id;
                std::thread::spawn(move || store.mark_redeemed(id, Utc::now()).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .filter(|h| h.join().unwrap())
            .count();
        assert_eq!(successes, 1);

        let stored = store.find_coupon_by_code("RESTO-CCCC-0001").unwrap().unwrap();
        assert_eq!(stored.status, CouponStatus::Redeemed);
    }

    #[test]
    fn test_find_today_coupon_keys_on_local_date() {
        let store = MemoryStore::default();
        let offer_now = Utc::now();
        let offer = store
            .create_offer(draft("Free Dessert", 15, OfferTargeting::All), offer_now)
            .unwrap();
        let customer = store.upsert_customer(registration("5550105"), offer_now).unwrap();

        // Issued 23:30 UTC March 1st.
        let issued_at = "2026-03-01T23:30:00Z".parse::<DateTime<Utc>>().unwrap();
        store
            .insert_coupon(coupon_for(offer.id, customer.id, "RESTO-DDDD-0001", issued_at))
            .unwrap();

        let utc = FixedOffset::east_opt(0).unwrap();
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();

        // Same UTC day: found. Next UTC day: not found.
        let same_day = "2026-03-01T23:59:00Z".parse::<DateTime<Utc>>().unwrap();
        let next_day = "2026-03-02T00:01:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(store.find_today_coupon(customer.id, same_day, utc).unwrap().is_some());
        assert!(store.find_today_coupon(customer.id, next_day, utc).unwrap().is_none());

        // At UTC+5:30 the coupon was issued on March 2nd, so a 00:01 UTC
        // March 2nd check (05:31 local) still finds it.
        assert!(store.find_today_coupon(customer.id, next_day, ist).unwrap().is_some());
    }

    #[test]
    fn test_eligible_offers_filter_status_window_targeting() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let customer = store.upsert_customer(registration("5550106"), now).unwrap();

        let live = store.create_offer(draft("10% OFF", 50, OfferTargeting::All), now).unwrap();
        let paused = store.create_offer(draft("20% OFF", 30, OfferTargeting::All), now).unwrap();
        store.set_offer_status(paused.id, OfferStatus::Inactive).unwrap();
        store
            .create_offer(draft("Regulars Only", 40, OfferTargeting::Frequent), now)
            .unwrap();
        let mut ended = draft("Expired Promo", 20, OfferTargeting::All);
        ended.ends_at = now - Duration::days(1);
        store.create_offer(ended, now).unwrap();

        // visit_count == 1: All matches, Frequent does not.
        let eligible = store.find_offers_eligible_for(&customer, now).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, live.id);
    }

    #[test]
    fn test_coupon_history_newest_first() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let offer = store.create_offer(draft("10% OFF", 50, OfferTargeting::All), now).unwrap();
        let customer = store.upsert_customer(registration("5550107"), now).unwrap();

        for (i, days_ago) in [3i64, 1, 2].iter().enumerate() {
            store
                .insert_coupon(coupon_for(
                    offer.id,
                    customer.id,
                    &format!("RESTO-HIST-{i:04}"),
                    now - Duration::days(*days_ago),
                ))
                .unwrap();
        }

        let history = store.coupon_history(customer.id).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].issued_at > history[1].issued_at);
        assert!(history[1].issued_at > history[2].issued_at);
    }
}
