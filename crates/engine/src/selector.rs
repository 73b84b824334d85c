//! Weighted random offer selection for the scratch draw.

use promo_core::types::Offer;
use rand::Rng;

/// Pick one offer with probability `w_i / Σw`. A fresh draw on every call.
///
/// Returns `None` for an empty candidate set — the draw path fails fast
/// with "no offers available" before selection is ever reached, so `None`
/// here indicates a caller bug rather than a customer-facing condition.
/// When every weight is zero the pick is uniform over the candidates.
pub fn pick_weighted<'a, R: Rng + ?Sized>(offers: &'a [Offer], rng: &mut R) -> Option<&'a Offer> {
    if offers.is_empty() {
        return None;
    }

    let total: u64 = offers.iter().map(|o| u64::from(o.weight)).sum();
    if total == 0 {
        return offers.get(rng.gen_range(0..offers.len()));
    }

    let mut roll = rng.gen_range(0..total);
    for offer in offers {
        let weight = u64::from(offer.weight);
        if roll < weight {
            return Some(offer);
        }
        roll -= weight;
    }
    // roll < total and the weights sum to total, so the loop always
    // returns; this keeps the compiler satisfied.
    offers.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use promo_core::types::{OfferStatus, OfferTargeting};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn offer(title: &str, weight: u32) -> Offer {
        let now = Utc::now();
        Offer {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            weight,
            status: OfferStatus::Active,
            targeting: OfferTargeting::All,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(30),
            allotted: 0,
            revealed: 0,
            redemptions: 0,
            created_at: now,
        }
    }

    #[test]
    fn test_empty_candidate_set_returns_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_weighted(&[], &mut rng).is_none());
    }

    #[test]
    fn test_single_candidate_always_selected() {
        let offers = vec![offer("10% OFF", 0)];
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            assert_eq!(pick_weighted(&offers, &mut rng).unwrap().id, offers[0].id);
        }
    }

    #[test]
    fn test_zero_weight_offer_never_drawn_among_positive() {
        let offers = vec![offer("A", 10), offer("B", 0), offer("C", 5)];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let picked = pick_weighted(&offers, &mut rng).unwrap();
            assert_ne!(picked.title, "B");
        }
    }

    #[test]
    fn test_frequencies_converge_to_weights() {
        // The headline scenario: {A:50, B:30, C:15, D:5} over 100k draws
        // lands within 2% of the configured proportions.
        let offers = vec![
            offer("A", 50),
            offer("B", 30),
            offer("C", 15),
            offer("D", 5),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<String, u64> = HashMap::new();

        const TRIALS: u64 = 100_000;
        for _ in 0..TRIALS {
            let picked = pick_weighted(&offers, &mut rng).unwrap();
            *counts.entry(picked.title.clone()).or_default() += 1;
        }

        for o in &offers {
            let observed = counts.get(&o.title).copied().unwrap_or(0) as f64 / TRIALS as f64;
            let expected = f64::from(o.weight) / 100.0;
            assert!(
                (observed - expected).abs() < 0.02,
                "{}: observed {observed:.4}, expected {expected:.4}",
                o.title
            );
        }
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_uniform() {
        let offers = vec![offer("A", 0), offer("B", 0), offer("C", 0)];
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<String, u64> = HashMap::new();

        const TRIALS: u64 = 30_000;
        for _ in 0..TRIALS {
            let picked = pick_weighted(&offers, &mut rng).unwrap();
            *counts.entry(picked.title.clone()).or_default() += 1;
        }

        for o in &offers {
            let observed = counts.get(&o.title).copied().unwrap_or(0) as f64 / TRIALS as f64;
            assert!(
                (observed - 1.0 / 3.0).abs() < 0.02,
                "{}: observed {observed:.4}, expected uniform",
                o.title
            );
        }
    }
}
