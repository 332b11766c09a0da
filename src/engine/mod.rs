//! The purchase engine.
//!
//! Owns every mutation of balances, stock, and discount uses. A purchase
//! attempt walks a fixed sequence: validate, reserve (tentative ledger
//! debits), peek inventory, deliver, commit (remove lines, write the
//! record). A failure anywhere after reservation rolls the ledger back to
//! its pre-attempt state; the inventory file is only touched at commit, so
//! a failed attempt never loses stock.
//!
//! All reservation/commit/rollback work for one product runs under that
//! product's lock; attempts for different products proceed in parallel.
//! Buyer balances are shared across products, so their debits are
//! individually atomic inside the ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::Rng;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::Credits;
use crate::delivery::{DeliveryChannel, Notifier};
use crate::discount;
use crate::inventory::InventoryStore;
use crate::ledger::{Ledger, LedgerError};
use crate::model::{
    BuyerId, DiscountCode, DiscountKind, ProductId, PurchaseId, PurchaseRecord, RedeemCode,
    ShopCommand,
};

mod error;
pub use error::{PurchaseError, RedeemError, RestockError, ShopError};

mod saga;
use saga::{LedgerMutation, Saga};

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PURCHASE_ID_LEN: usize = 5;
const REDEEM_CODE_LEN: usize = 12;

/// What the buyer gets back from a committed purchase.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub purchase_id: PurchaseId,
    pub product_name: String,
    pub quantity: u32,
    pub original_cost: Credits,
    pub discount_applied: Credits,
    pub final_cost: Credits,
}

/// The shop engine.
///
/// Shared across tasks behind an `Arc`; every operation takes `&self`.
pub struct Engine {
    ledger: Ledger,
    inventory: InventoryStore,
    delivery: Arc<dyn DeliveryChannel>,
    notifier: Arc<dyn Notifier>,
    product_locks: Mutex<HashMap<ProductId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Public API
impl Engine {
    pub fn new(
        ledger: Ledger,
        inventory: InventoryStore,
        delivery: Arc<dyn DeliveryChannel>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Engine {
            ledger,
            inventory,
            delivery,
            notifier,
            product_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Read access to balances, products, and purchase history.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run the engine over a stream of shop commands, skipping failures.
    pub async fn run(&self, mut stream: impl Stream<Item = ShopCommand> + Unpin) {
        while let Some(command) = stream.next().await {
            // a failed command must not stop the replay
            if let Err(e) = self.apply(command).await {
                warn!(reason = %e, "command skipped");
            }
        }
    }

    /// Apply a single shop command.
    pub async fn apply(&self, command: ShopCommand) -> Result<(), ShopError> {
        match command {
            ShopCommand::Grant { buyer, amount } => {
                self.grant_credits(buyer, amount);
            }
            ShopCommand::Redeem { buyer, code } => {
                self.redeem_code(buyer, &code)?;
            }
            ShopCommand::Purchase {
                buyer,
                product,
                quantity,
                discount,
            } => {
                self.execute_purchase(buyer, product, quantity, discount.as_deref())
                    .await?;
            }
            ShopCommand::Blacklist { buyer } => self.set_blacklist(buyer, true),
            ShopCommand::Unblacklist { buyer } => self.set_blacklist(buyer, false),
        }
        Ok(())
    }

    /// Buy `quantity` units of a product, optionally with a discount code.
    ///
    /// On success the buyer has been charged, the stock and inventory file
    /// shrank by `quantity`, and exactly one purchase record exists. On any
    /// error except [`PurchaseError::DeliveryPersistenceFailure`] the shop
    /// state is exactly as it was before the call.
    pub async fn execute_purchase(
        &self,
        buyer: BuyerId,
        product_id: ProductId,
        quantity: u32,
        discount_code: Option<&str>,
    ) -> Result<Receipt, PurchaseError> {
        if quantity < 1 {
            return Err(PurchaseError::InvalidInput(
                "quantity must be at least 1".into(),
            ));
        }

        // Serializes every reservation/commit/rollback for this product.
        let lock = self.product_lock(product_id);
        let _guard = lock.lock().await;

        if self.ledger.is_blacklisted(buyer) {
            return Err(PurchaseError::Blacklisted(buyer));
        }

        let discount = match discount_code {
            Some(code) => Some(
                self.ledger
                    .discount(code)
                    .filter(|d| d.is_valid(Utc::now()))
                    .ok_or_else(|| PurchaseError::InvalidDiscount(code.trim().to_uppercase()))?,
            ),
            None => None,
        };

        let product =
            self.ledger
                .product(product_id)
                .ok_or(PurchaseError::InsufficientStock {
                    requested: quantity,
                    available: 0,
                })?;
        if product.stock < quantity {
            return Err(PurchaseError::InsufficientStock {
                requested: quantity,
                available: product.stock,
            });
        }

        let quote = discount::evaluate(product.unit_price, quantity, discount.as_ref());
        let balance = self.ledger.balance(buyer);
        if balance < quote.final_cost {
            return Err(PurchaseError::InsufficientCredits {
                required: quote.final_cost,
                available: balance,
            });
        }

        // RESERVED: tentative debits; the saga reverts them on any later
        // failure, including every early return below.
        let mut saga = Saga::new(self.ledger.clone());
        self.ledger
            .debit_balance(buyer, quote.final_cost)
            .map_err(reservation_error)?;
        saga.record(LedgerMutation::BalanceDebited {
            buyer,
            amount: quote.final_cost,
        });
        self.ledger
            .debit_stock(product_id, quantity)
            .map_err(reservation_error)?;
        saga.record(LedgerMutation::StockDebited {
            product: product_id,
            quantity,
        });
        if let Some(d) = &discount {
            self.ledger
                .consume_discount_use(&d.code)
                .map_err(reservation_error)?;
            saga.record(LedgerMutation::DiscountUseConsumed {
                code: d.code.clone(),
            });
        }

        // DELIVERING: peek without removing, then hand off exactly once.
        let lines = self.inventory.peek(product_id, quantity).await?;
        let purchase_id = self.generate_purchase_id();
        if let Err(e) = self.delivery.deliver(buyer, &purchase_id, &lines).await {
            warn!(
                buyer,
                product = product_id,
                %purchase_id,
                reason = %e,
                "delivery failed, rolling back"
            );
            return Err(PurchaseError::DeliveryFailure(e));
        }

        // COMMITTING: drop the delivered lines, then record the sale.
        if let Err(e) = self.inventory.remove(product_id, quantity).await {
            error!(
                buyer,
                product = product_id,
                %purchase_id,
                quantity,
                cost = %quote.final_cost,
                reason = %e,
                "goods delivered but inventory commit failed; ledger reverted, reconcile manually"
            );
            return Err(PurchaseError::DeliveryPersistenceFailure {
                purchase_id,
                reason: e.to_string(),
            });
        }
        let record = PurchaseRecord {
            purchase_id: purchase_id.clone(),
            buyer,
            product: product_id,
            quantity,
            original_cost: quote.original_cost,
            discount_applied: quote.discount_amount,
            discount_code: discount.as_ref().map(|d| d.code.clone()),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.ledger.insert_purchase(record) {
            error!(
                buyer,
                product = product_id,
                %purchase_id,
                quantity,
                cost = %quote.final_cost,
                reason = %e,
                "goods delivered but the sale could not be recorded; ledger reverted, reconcile manually"
            );
            return Err(PurchaseError::DeliveryPersistenceFailure {
                purchase_id,
                reason: e.to_string(),
            });
        }
        saga.commit();

        info!(
            buyer,
            product = product_id,
            %purchase_id,
            quantity,
            cost = %quote.final_cost,
            "purchase committed"
        );

        let remaining = self.ledger.product(product_id).map_or(0, |p| p.stock);
        if remaining == 0 {
            self.notifier.stock_empty(&product.name).await;
        }

        Ok(Receipt {
            purchase_id,
            product_name: product.name,
            quantity,
            original_cost: quote.original_cost,
            discount_applied: quote.discount_amount,
            final_cost: quote.final_cost,
        })
    }

    /// Credit a buyer by admin action; returns the new balance.
    pub fn grant_credits(&self, buyer: BuyerId, amount: Credits) -> Credits {
        let balance = self.ledger.credit_balance(buyer, amount);
        info!(buyer, amount = %amount, balance = %balance, "credits granted");
        balance
    }

    /// Redeem a single-use code; returns the credits granted.
    pub fn redeem_code(&self, buyer: BuyerId, code: &str) -> Result<Credits, RedeemError> {
        let value = self
            .ledger
            .claim_redeem_code(code.trim())
            .map_err(|_| RedeemError)?;
        let balance = self.ledger.credit_balance(buyer, value);
        info!(buyer, value = %value, balance = %balance, "code redeemed");
        Ok(value)
    }

    pub fn set_blacklist(&self, buyer: BuyerId, blacklisted: bool) {
        self.ledger.set_blacklist(buyer, blacklisted);
        info!(buyer, blacklisted, "blacklist updated");
    }

    /// Append inventory lines for a product and bump its stock count.
    /// Returns the new stock level.
    pub async fn restock(
        &self,
        product_id: ProductId,
        lines: &[String],
    ) -> Result<u32, RestockError> {
        if self.ledger.product(product_id).is_none() {
            return Err(RestockError::UnknownProduct(product_id));
        }

        let lock = self.product_lock(product_id);
        let _guard = lock.lock().await;

        let added = self.inventory.append(product_id, lines).await?;
        if added == 0 {
            return Err(RestockError::EmptyRestock);
        }
        let stock = self
            .ledger
            .credit_stock(product_id, added)
            .map_err(|_| RestockError::UnknownProduct(product_id))?;
        info!(product = product_id, added, stock, "restocked");
        Ok(stock)
    }

    /// Recount a product's inventory file and overwrite its stock count,
    /// used after manual edits to the file. Returns the reconciled count.
    pub async fn reconcile_stock(&self, product_id: ProductId) -> Result<u32, RestockError> {
        let product = self
            .ledger
            .product(product_id)
            .ok_or(RestockError::UnknownProduct(product_id))?;

        let lock = self.product_lock(product_id);
        let _guard = lock.lock().await;

        let count = self.inventory.count_lines(product_id).await?;
        self.ledger
            .set_stock(product_id, count)
            .map_err(|_| RestockError::UnknownProduct(product_id))?;
        info!(product = product_id, stock = count, "stock reconciled");

        if count == 0 {
            self.notifier.stock_empty(&product.name).await;
        }
        Ok(count)
    }

    /// Create a discount code valid for `valid_for` from now.
    pub fn create_discount(
        &self,
        code: &str,
        amount: u64,
        kind: DiscountKind,
        max_uses: u32,
        valid_for: chrono::Duration,
    ) -> Result<DiscountCode, ShopError> {
        let discount = DiscountCode::new(code, amount, kind, max_uses, Utc::now() + valid_for)?;
        self.ledger.insert_discount(discount.clone())?;
        info!(code = %discount.code, "discount code created");
        Ok(discount)
    }

    pub fn remove_discount(&self, code: &str) -> Option<DiscountCode> {
        self.ledger.remove_discount(code)
    }

    pub fn balance(&self, buyer: BuyerId) -> Credits {
        self.ledger.balance(buyer)
    }

    pub fn purchase_info(&self, id: &PurchaseId) -> Option<PurchaseRecord> {
        self.ledger.purchase(id)
    }

    pub fn purchases_for(&self, buyer: BuyerId) -> Vec<PurchaseRecord> {
        self.ledger.purchases_for(buyer)
    }

    /// Generate `count` fresh single-use redeem codes worth `credits` each.
    pub fn generate_redeem_codes(&self, credits: Credits, count: u32) -> Vec<String> {
        let mut rng = rand::rng();
        let mut codes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let code = loop {
                let candidate: String = (0..REDEEM_CODE_LEN)
                    .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
                    .collect();
                if !self.ledger.redeem_code_exists(&candidate) {
                    break candidate;
                }
            };
            if let Err(e) = self
                .ledger
                .insert_redeem_code(RedeemCode::new(code.clone(), credits))
            {
                warn!(reason = %e, "redeem code insert failed");
                continue;
            }
            codes.push(code);
        }
        info!(count = codes.len(), value = %credits, "redeem codes generated");
        codes
    }
}

/// Private API
impl Engine {
    fn product_lock(&self, product: ProductId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.product_locks.lock().expect("Mutex poisoned");
        Arc::clone(locks.entry(product).or_default())
    }

    /// Candidate ids are retried until one is unused; the exclusion check
    /// runs before acceptance so the loop terminates with a free id.
    fn generate_purchase_id(&self) -> PurchaseId {
        let mut rng = rand::rng();
        loop {
            let suffix: String = (0..PURCHASE_ID_LEN)
                .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
                .collect();
            let candidate = PurchaseId::new(format!("PUR-{suffix}"));
            if !self.ledger.purchase_id_exists(&candidate) {
                return candidate;
            }
        }
    }
}

/// Map a failed tentative debit onto the purchase error it represents.
/// Reachable only when a concurrent operation changed the ledger between
/// the precondition checks and the reservation.
fn reservation_error(e: LedgerError) -> PurchaseError {
    match e {
        LedgerError::InsufficientBalance {
            available, required, ..
        } => PurchaseError::InsufficientCredits {
            required,
            available,
        },
        LedgerError::InsufficientStock {
            available,
            requested,
            ..
        } => PurchaseError::InsufficientStock {
            requested,
            available,
        },
        LedgerError::UnknownDiscount(code) | LedgerError::DiscountExhausted(code) => {
            PurchaseError::InvalidDiscount(code)
        }
        other => PurchaseError::InvalidInput(other.to_string()),
    }
}
