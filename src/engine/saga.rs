//! Compensation tracking for a purchase attempt.
//!
//! The inventory file lives outside the ledger's transactional boundary, so
//! a purchase cannot be a single multi-row transaction. Instead the engine
//! applies its forward ledger mutations one by one, recording each in a
//! [`Saga`]; if the attempt fails at any later point the saga applies the
//! inverse of every recorded mutation in reverse order. Dropping an
//! uncommitted saga rolls back, so every early-return error path in the
//! engine restores the pre-attempt ledger state without spelling it out.

use tracing::{info, warn};

use crate::Credits;
use crate::ledger::Ledger;
use crate::model::{BuyerId, ProductId, PurchaseId};

/// A tentative ledger mutation and the data needed to invert it.
pub(super) enum LedgerMutation {
    BalanceDebited { buyer: BuyerId, amount: Credits },
    StockDebited { product: ProductId, quantity: u32 },
    DiscountUseConsumed { code: String },
    PurchaseRecorded { purchase_id: PurchaseId },
}

/// Applied mutations of one purchase attempt, rolled back on drop unless
/// committed.
pub(super) struct Saga {
    ledger: Ledger,
    applied: Vec<LedgerMutation>,
    committed: bool,
}

impl Saga {
    pub(super) fn new(ledger: Ledger) -> Self {
        Saga {
            ledger,
            applied: Vec::new(),
            committed: false,
        }
    }

    /// Record a mutation that has just been applied to the ledger.
    pub(super) fn record(&mut self, mutation: LedgerMutation) {
        self.applied.push(mutation);
    }

    /// The purchase is durable; nothing will be reverted.
    pub(super) fn commit(mut self) {
        self.committed = true;
    }

    fn rollback(&mut self) {
        if self.applied.is_empty() {
            return;
        }
        info!(mutations = self.applied.len(), "rolling back purchase attempt");
        for mutation in self.applied.drain(..).rev() {
            match mutation {
                LedgerMutation::BalanceDebited { buyer, amount } => {
                    self.ledger.credit_balance(buyer, amount);
                }
                LedgerMutation::StockDebited { product, quantity } => {
                    if let Err(e) = self.ledger.credit_stock(product, quantity) {
                        warn!(product, quantity, reason = %e, "stock rollback failed");
                    }
                }
                LedgerMutation::DiscountUseConsumed { code } => {
                    if let Err(e) = self.ledger.restore_discount_use(&code) {
                        warn!(code, reason = %e, "discount rollback failed");
                    }
                }
                LedgerMutation::PurchaseRecorded { purchase_id } => {
                    self.ledger.remove_purchase(&purchase_id);
                }
            }
        }
    }
}

impl Drop for Saga {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
