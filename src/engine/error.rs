//! Error types for shop operations.

use thiserror::Error;

use crate::Credits;
use crate::delivery::DeliveryError;
use crate::inventory::InventoryError;
use crate::ledger::LedgerError;
use crate::model::{BuyerId, DiscountSpecError, ProductId, PurchaseId};

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("purchase failed: {0}")]
    Purchase(#[from] PurchaseError),

    #[error("redeem failed: {0}")]
    Redeem(#[from] RedeemError),

    #[error("restock failed: {0}")]
    Restock(#[from] RestockError),

    #[error("{0}")]
    Discount(#[from] DiscountSpecError),

    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

/// Error during a purchase attempt.
///
/// Everything except `DeliveryPersistenceFailure` is fully recovered before
/// returning: any tentative debit has been reversed and no record exists.
#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("invalid purchase request: {0}")]
    InvalidInput(String),

    #[error("buyer {0} is blacklisted")]
    Blacklisted(BuyerId),

    #[error("invalid, expired, or exhausted discount code '{0}'")]
    InvalidDiscount(String),

    #[error("not enough stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits {
        required: Credits,
        available: Credits,
    },

    #[error("delivery failed, purchase rolled back: {0}")]
    DeliveryFailure(#[source] DeliveryError),

    /// The buyer already has the goods but the sale could not be durably
    /// recorded. The ledger has been reverted; an operator must reconcile
    /// by hand (a naive retry would dispense the goods twice).
    #[error("purchase {purchase_id} was delivered but could not be recorded; ledger reverted: {reason}")]
    DeliveryPersistenceFailure {
        purchase_id: PurchaseId,
        reason: String,
    },

    #[error("storage fault: {0}")]
    StorageFault(#[from] InventoryError),
}

/// Error during code redemption. Unknown and already-used codes are not
/// distinguished, so a code cannot be probed for existence.
#[derive(Debug, Error)]
#[error("invalid or already used code")]
pub struct RedeemError;

/// Error while restocking or reconciling a product.
#[derive(Debug, Error)]
pub enum RestockError {
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("restock contained no usable lines")]
    EmptyRestock,

    #[error("storage fault: {0}")]
    Inventory(#[from] InventoryError),
}
