//! Ledger store: balances, products, discount codes, redeem codes, and
//! purchase records.
//!
//! Every mutating operation is individually atomic: it takes the write lock,
//! verifies its precondition, and applies the change, so no caller can ever
//! observe a negative balance, negative stock, or a discount counter outside
//! its `0..=max_uses` range. The purchase engine composes these operations
//! into a logically-atomic group with compensating inverses (see
//! [`crate::engine::saga`]).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::Credits;
use crate::model::{
    Account, BuyerId, DiscountCode, Product, ProductId, PurchaseId, PurchaseRecord, RedeemCode,
};

/// Error from an individual ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient credits for buyer {buyer}: available {available}, required {required}")]
    InsufficientBalance {
        buyer: BuyerId,
        available: Credits,
        required: Credits,
    },

    #[error("insufficient stock for product {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: ProductId,
        available: u32,
        requested: u32,
    },

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("product {0} already exists")]
    DuplicateProduct(ProductId),

    #[error("unknown discount code '{0}'")]
    UnknownDiscount(String),

    #[error("discount code '{0}' has no uses left")]
    DiscountExhausted(String),

    #[error("discount code '{0}' is already at its maximum use count")]
    DiscountAtMaxUses(String),

    #[error("discount code '{0}' already exists")]
    DuplicateDiscount(String),

    #[error("invalid or already used code")]
    InvalidRedeemCode,

    #[error("redeem code '{0}' already exists")]
    DuplicateRedeemCode(String),

    #[error("purchase id {0} already recorded")]
    DuplicatePurchaseId(PurchaseId),
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<BuyerId, Account>,
    products: HashMap<ProductId, Product>,
    discounts: HashMap<String, DiscountCode>,
    redeem_codes: HashMap<String, RedeemCode>,
    purchases: HashMap<PurchaseId, PurchaseRecord>,
}

/// Shared handle to the ledger. Cloning is cheap and all clones observe the
/// same state.
#[derive(Clone, Default)]
pub struct Ledger {
    inner: Arc<RwLock<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    // ---- accounts ----

    /// Snapshot of a buyer's account, if one exists.
    pub fn account(&self, buyer: BuyerId) -> Option<Account> {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .accounts
            .get(&buyer)
            .cloned()
    }

    /// A buyer with no account has a zero balance.
    pub fn balance(&self, buyer: BuyerId) -> Credits {
        self.account(buyer).map(|a| a.credits).unwrap_or_default()
    }

    pub fn is_blacklisted(&self, buyer: BuyerId) -> bool {
        self.account(buyer).map(|a| a.blacklisted).unwrap_or(false)
    }

    /// Credit a buyer's balance, creating the account on first contact.
    /// Returns the new balance.
    pub fn credit_balance(&self, buyer: BuyerId, amount: Credits) -> Credits {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let account = state
            .accounts
            .entry(buyer)
            .or_insert_with(|| Account::new(buyer));
        account.credits += amount;
        account.credits
    }

    /// Debit a buyer's balance; fails without mutating if the balance would
    /// go negative.
    pub fn debit_balance(&self, buyer: BuyerId, amount: Credits) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let available = state
            .accounts
            .get(&buyer)
            .map(|a| a.credits)
            .unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                buyer,
                available,
                required: amount,
            })?;
        state
            .accounts
            .entry(buyer)
            .or_insert_with(|| Account::new(buyer))
            .credits = remaining;
        Ok(())
    }

    pub fn set_blacklist(&self, buyer: BuyerId, blacklisted: bool) {
        let mut state = self.inner.write().expect("RwLock poisoned");
        state
            .accounts
            .entry(buyer)
            .or_insert_with(|| Account::new(buyer))
            .blacklisted = blacklisted;
    }

    /// All accounts, ordered by buyer id for stable reporting.
    pub fn accounts(&self) -> Vec<Account> {
        let state = self.inner.read().expect("RwLock poisoned");
        let mut accounts: Vec<_> = state.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.buyer);
        accounts
    }

    // ---- products ----

    pub fn insert_product(&self, product: Product) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        if state.products.contains_key(&product.id) {
            return Err(LedgerError::DuplicateProduct(product.id));
        }
        state.products.insert(product.id, product);
        Ok(())
    }

    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .products
            .get(&id)
            .cloned()
    }

    /// All products, ordered by name as the storefront lists them.
    pub fn products(&self) -> Vec<Product> {
        let state = self.inner.read().expect("RwLock poisoned");
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    pub fn credit_stock(&self, id: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let product = state
            .products
            .get_mut(&id)
            .ok_or(LedgerError::UnknownProduct(id))?;
        product.stock += quantity;
        Ok(product.stock)
    }

    /// Debit product stock; fails without mutating if fewer than `quantity`
    /// units remain.
    pub fn debit_stock(&self, id: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let product = state
            .products
            .get_mut(&id)
            .ok_or(LedgerError::UnknownProduct(id))?;
        if product.stock < quantity {
            return Err(LedgerError::InsufficientStock {
                product: id,
                available: product.stock,
                requested: quantity,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    /// Overwrite a product's stock count, used when reconciling against the
    /// inventory file after manual edits.
    pub fn set_stock(&self, id: ProductId, stock: u32) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let product = state
            .products
            .get_mut(&id)
            .ok_or(LedgerError::UnknownProduct(id))?;
        product.stock = stock;
        Ok(())
    }

    // ---- discount codes ----

    pub fn insert_discount(&self, code: DiscountCode) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        if state.discounts.contains_key(&code.code) {
            return Err(LedgerError::DuplicateDiscount(code.code));
        }
        state.discounts.insert(code.code.clone(), code);
        Ok(())
    }

    /// Look up a discount by case-insensitive code.
    pub fn discount(&self, code: &str) -> Option<DiscountCode> {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .discounts
            .get(&code.trim().to_uppercase())
            .cloned()
    }

    pub fn remove_discount(&self, code: &str) -> Option<DiscountCode> {
        self.inner
            .write()
            .expect("RwLock poisoned")
            .discounts
            .remove(&code.trim().to_uppercase())
    }

    /// Tentatively consume one use of a discount code. Fails without
    /// mutating when no uses remain.
    pub fn consume_discount_use(&self, code: &str) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let key = code.trim().to_uppercase();
        let discount = state
            .discounts
            .get_mut(&key)
            .ok_or_else(|| LedgerError::UnknownDiscount(key.clone()))?;
        if discount.uses_left == 0 {
            return Err(LedgerError::DiscountExhausted(key));
        }
        discount.uses_left -= 1;
        Ok(())
    }

    /// Inverse of [`consume_discount_use`](Self::consume_discount_use);
    /// never pushes the counter past `max_uses`.
    pub fn restore_discount_use(&self, code: &str) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let key = code.trim().to_uppercase();
        let discount = state
            .discounts
            .get_mut(&key)
            .ok_or_else(|| LedgerError::UnknownDiscount(key.clone()))?;
        if discount.uses_left >= discount.max_uses {
            return Err(LedgerError::DiscountAtMaxUses(key));
        }
        discount.uses_left += 1;
        Ok(())
    }

    // ---- redeem codes ----

    pub fn insert_redeem_code(&self, code: RedeemCode) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        if state.redeem_codes.contains_key(&code.code) {
            return Err(LedgerError::DuplicateRedeemCode(code.code));
        }
        state.redeem_codes.insert(code.code.clone(), code);
        Ok(())
    }

    pub fn redeem_code_exists(&self, code: &str) -> bool {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .redeem_codes
            .contains_key(code)
    }

    /// Atomically mark a redeem code used and return its credit value.
    /// Unknown and already-used codes are indistinguishable to the caller.
    pub fn claim_redeem_code(&self, code: &str) -> Result<Credits, LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        let entry = state
            .redeem_codes
            .get_mut(code)
            .ok_or(LedgerError::InvalidRedeemCode)?;
        if entry.used {
            return Err(LedgerError::InvalidRedeemCode);
        }
        entry.used = true;
        Ok(entry.credits)
    }

    // ---- purchase records ----

    pub fn insert_purchase(&self, record: PurchaseRecord) -> Result<(), LedgerError> {
        let mut state = self.inner.write().expect("RwLock poisoned");
        if state.purchases.contains_key(&record.purchase_id) {
            return Err(LedgerError::DuplicatePurchaseId(record.purchase_id));
        }
        state.purchases.insert(record.purchase_id.clone(), record);
        Ok(())
    }

    /// Delete a record as part of rolling back that same purchase.
    pub fn remove_purchase(&self, id: &PurchaseId) -> Option<PurchaseRecord> {
        self.inner
            .write()
            .expect("RwLock poisoned")
            .purchases
            .remove(id)
    }

    pub fn purchase(&self, id: &PurchaseId) -> Option<PurchaseRecord> {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .purchases
            .get(id)
            .cloned()
    }

    pub fn purchase_id_exists(&self, id: &PurchaseId) -> bool {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .purchases
            .contains_key(id)
    }

    /// A buyer's purchase history, newest first.
    pub fn purchases_for(&self, buyer: BuyerId) -> Vec<PurchaseRecord> {
        let state = self.inner.read().expect("RwLock poisoned");
        let mut records: Vec<_> = state
            .purchases
            .values()
            .filter(|r| r.buyer == buyer)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }
}
