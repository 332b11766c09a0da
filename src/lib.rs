pub mod credits;
pub mod csv;
pub mod delivery;
pub mod discount;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod model;

pub use credits::Credits;
pub use engine::{Engine, PurchaseError, Receipt, RedeemError, RestockError, ShopError};
pub use inventory::InventoryStore;
pub use ledger::Ledger;
pub use model::{BuyerId, ProductId, PurchaseId, ShopCommand};
