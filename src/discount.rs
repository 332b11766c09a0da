//! Discount evaluation.
//!
//! Pure pricing arithmetic: no clock, no storage, no side effects. Usage
//! counters on discount codes are adjusted by the purchase engine at commit
//! time, never here.

use crate::Credits;
use crate::model::{DiscountCode, DiscountKind};

/// The priced outcome of a purchase attempt before any mutation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub original_cost: Credits,
    pub discount_amount: Credits,
    pub final_cost: Credits,
}

/// Compute the cost of `quantity` units at `unit_price`, applying an
/// optional discount.
///
/// Guarantees `0 <= discount_amount <= original_cost` and
/// `final_cost = original_cost - discount_amount`.
pub fn evaluate(unit_price: Credits, quantity: u32, discount: Option<&DiscountCode>) -> Quote {
    let original_cost = unit_price.times(quantity);

    let discount_amount = match discount {
        None => Credits::ZERO,
        Some(code) => match code.kind {
            // Floored integer percentage of the original cost.
            DiscountKind::Percent => Credits::new(original_cost.value() * code.amount / 100),
            // Flat amounts larger than the cost clamp to the cost.
            DiscountKind::Fixed => Credits::new(code.amount.min(original_cost.value())),
        },
    };

    Quote {
        original_cost,
        discount_amount,
        final_cost: original_cost.saturating_sub(discount_amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn percent(amount: u64) -> DiscountCode {
        DiscountCode::new(
            "PCT",
            amount,
            DiscountKind::Percent,
            1,
            Utc::now() + Duration::days(1),
        )
        .unwrap()
    }

    fn fixed(amount: u64) -> DiscountCode {
        DiscountCode::new(
            "FIX",
            amount,
            DiscountKind::Fixed,
            1,
            Utc::now() + Duration::days(1),
        )
        .unwrap()
    }

    #[test]
    fn no_discount() {
        let quote = evaluate(Credits::new(10), 3, None);
        assert_eq!(quote.original_cost, Credits::new(30));
        assert_eq!(quote.discount_amount, Credits::ZERO);
        assert_eq!(quote.final_cost, Credits::new(30));
    }

    #[test]
    fn percent_discount_is_floored() {
        // 20% of 30 = 6
        let quote = evaluate(Credits::new(10), 3, Some(&percent(20)));
        assert_eq!(quote.discount_amount, Credits::new(6));
        assert_eq!(quote.final_cost, Credits::new(24));

        // 33% of 10 = 3.3, floored to 3
        let quote = evaluate(Credits::new(10), 1, Some(&percent(33)));
        assert_eq!(quote.discount_amount, Credits::new(3));
        assert_eq!(quote.final_cost, Credits::new(7));
    }

    #[test]
    fn full_percent_discount_is_free() {
        let quote = evaluate(Credits::new(7), 2, Some(&percent(100)));
        assert_eq!(quote.discount_amount, Credits::new(14));
        assert_eq!(quote.final_cost, Credits::ZERO);
    }

    #[test]
    fn fixed_discount_reduces_cost() {
        let quote = evaluate(Credits::new(10), 2, Some(&fixed(5)));
        assert_eq!(quote.original_cost, Credits::new(20));
        assert_eq!(quote.discount_amount, Credits::new(5));
        assert_eq!(quote.final_cost, Credits::new(15));
    }

    #[test]
    fn fixed_discount_clamps_to_original_cost() {
        let quote = evaluate(Credits::new(3), 2, Some(&fixed(50)));
        assert_eq!(quote.discount_amount, Credits::new(6));
        assert_eq!(quote.final_cost, Credits::ZERO);
    }

    #[test]
    fn zero_quantity_costs_nothing() {
        let quote = evaluate(Credits::new(10), 0, Some(&fixed(5)));
        assert_eq!(quote.original_cost, Credits::ZERO);
        assert_eq!(quote.discount_amount, Credits::ZERO);
        assert_eq!(quote.final_cost, Credits::ZERO);
    }

    #[test]
    fn invariants_hold_across_inputs() {
        for price in [0u64, 1, 7, 10, 999] {
            for qty in [0u32, 1, 3, 100] {
                for code in [None, Some(percent(20)), Some(percent(100)), Some(fixed(13))] {
                    let quote = evaluate(Credits::new(price), qty, code.as_ref());
                    assert!(quote.discount_amount <= quote.original_cost);
                    assert_eq!(
                        quote.final_cost,
                        quote.original_cost.saturating_sub(quote.discount_amount)
                    );
                }
            }
        }
    }
}
