//! Core domain types for the credit shop.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::Credits;

/// Buyer identifier.
pub type BuyerId = u64;

/// Product identifier.
pub type ProductId = u32;

/// Identifier of a committed purchase, e.g. `PUR-7QX2B`.
///
/// Never reused, even after a rollback: a rolled-back attempt leaves no
/// record behind, but its identifier is simply discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PurchaseId(String);

impl PurchaseId {
    pub fn new(id: impl Into<String>) -> Self {
        PurchaseId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A buyer account with its credit balance and blacklist flag.
///
/// Created lazily on first grant, redemption, or purchase attempt.
#[derive(Debug, Clone, Default)]
pub struct Account {
    pub buyer: BuyerId,
    pub credits: Credits,
    pub blacklisted: bool,
}

impl Account {
    pub fn new(buyer: BuyerId) -> Self {
        Account {
            buyer,
            ..Account::default()
        }
    }
}

/// A product for sale. `stock` mirrors the line count of the product's
/// inventory file whenever no purchase or restock is in flight.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Credits,
    pub stock: u32,
}

/// How a discount amount is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    /// Flat credit reduction, clamped to the original cost.
    Fixed,
    /// Percentage of the original cost, floored.
    Percent,
}

/// Rejected parameters for a new discount code.
#[derive(Debug, Error)]
pub enum DiscountSpecError {
    #[error("percentage discount must be between 1 and 100, got {0}")]
    InvalidPercent(u64),
    #[error("discount code must not be empty")]
    EmptyCode,
}

/// A reusable discount code. Codes are case-normalized to uppercase.
#[derive(Debug, Clone)]
pub struct DiscountCode {
    pub code: String,
    pub amount: u64,
    pub kind: DiscountKind,
    pub max_uses: u32,
    pub uses_left: u32,
    pub expires_at: DateTime<Utc>,
}

impl DiscountCode {
    pub fn new(
        code: &str,
        amount: u64,
        kind: DiscountKind,
        max_uses: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, DiscountSpecError> {
        if code.trim().is_empty() {
            return Err(DiscountSpecError::EmptyCode);
        }
        if kind == DiscountKind::Percent && !(1..=100).contains(&amount) {
            return Err(DiscountSpecError::InvalidPercent(amount));
        }
        Ok(DiscountCode {
            code: code.trim().to_uppercase(),
            amount,
            kind,
            max_uses,
            uses_left: max_uses,
            expires_at,
        })
    }

    /// Usable iff it has uses left and has not expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.uses_left > 0 && now < self.expires_at
    }
}

/// A single-use code granting credits on redemption.
#[derive(Debug, Clone)]
pub struct RedeemCode {
    pub code: String,
    pub credits: Credits,
    pub used: bool,
}

impl RedeemCode {
    pub fn new(code: impl Into<String>, credits: Credits) -> Self {
        RedeemCode {
            code: code.into(),
            credits,
            used: false,
        }
    }
}

/// Durable record of a committed purchase. Written exactly once, at commit;
/// deleted only when that same purchase is rolled back.
#[derive(Debug, Clone)]
pub struct PurchaseRecord {
    pub purchase_id: PurchaseId,
    pub buyer: BuyerId,
    pub product: ProductId,
    pub quantity: u32,
    pub original_cost: Credits,
    pub discount_applied: Credits,
    pub discount_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A command representing the possible inputs of the shop engine.
#[derive(Debug, Clone)]
pub enum ShopCommand {
    /// Credit a buyer's balance by admin action.
    Grant { buyer: BuyerId, amount: Credits },
    /// Redeem a single-use code for credits.
    Redeem { buyer: BuyerId, code: String },
    /// Buy `quantity` units of a product, optionally with a discount code.
    Purchase {
        buyer: BuyerId,
        product: ProductId,
        quantity: u32,
        discount: Option<String>,
    },
    /// Block a buyer from purchasing.
    Blacklist { buyer: BuyerId },
    /// Unblock a buyer.
    Unblacklist { buyer: BuyerId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn discount_code_normalizes_to_uppercase() {
        let code = DiscountCode::new(
            " save20 ",
            20,
            DiscountKind::Percent,
            1,
            Utc::now() + Duration::days(30),
        )
        .unwrap();
        assert_eq!(code.code, "SAVE20");
        assert_eq!(code.uses_left, 1);
    }

    #[test]
    fn discount_code_rejects_bad_percent() {
        let expiry = Utc::now() + Duration::days(1);
        assert!(matches!(
            DiscountCode::new("X", 0, DiscountKind::Percent, 1, expiry),
            Err(DiscountSpecError::InvalidPercent(0))
        ));
        assert!(matches!(
            DiscountCode::new("X", 101, DiscountKind::Percent, 1, expiry),
            Err(DiscountSpecError::InvalidPercent(101))
        ));
        // Fixed discounts may exceed 100 credits.
        assert!(DiscountCode::new("X", 500, DiscountKind::Fixed, 1, expiry).is_ok());
    }

    #[test]
    fn discount_code_rejects_empty_code() {
        let expiry = Utc::now() + Duration::days(1);
        assert!(matches!(
            DiscountCode::new("  ", 5, DiscountKind::Fixed, 1, expiry),
            Err(DiscountSpecError::EmptyCode)
        ));
    }

    #[test]
    fn discount_validity_window() {
        let now = Utc::now();
        let mut code =
            DiscountCode::new("X", 10, DiscountKind::Fixed, 2, now + Duration::hours(1)).unwrap();
        assert!(code.is_valid(now));

        code.uses_left = 0;
        assert!(!code.is_valid(now));

        code.uses_left = 2;
        assert!(!code.is_valid(now + Duration::hours(2)));
    }

    #[test]
    fn account_is_created_empty() {
        let account = Account::new(42);
        assert_eq!(account.buyer, 42);
        assert_eq!(account.credits, Credits::ZERO);
        assert!(!account.blacklisted);
    }
}
