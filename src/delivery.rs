//! External collaborator seams: delivery of purchased lines and the
//! stock-empty notifier.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::model::{BuyerId, PurchaseId};

/// Why a delivery did not reach the buyer.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Hands purchased inventory lines to the buyer.
///
/// Implementations are unreliable and must not be assumed idempotent; the
/// engine invokes `deliver` at most once per purchase attempt and rolls the
/// attempt back if it fails.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(
        &self,
        buyer: BuyerId,
        purchase_id: &PurchaseId,
        lines: &[String],
    ) -> Result<(), DeliveryError>;
}

/// Told when a product's stock hits zero. Best-effort: it has no way to
/// fail and the purchase outcome never depends on it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn stock_empty(&self, product_name: &str);
}

/// Delivery channel for the replay binary: prints the payload to stdout.
pub struct StdoutDelivery;

#[async_trait]
impl DeliveryChannel for StdoutDelivery {
    async fn deliver(
        &self,
        buyer: BuyerId,
        purchase_id: &PurchaseId,
        lines: &[String],
    ) -> Result<(), DeliveryError> {
        println!("# delivery to buyer {buyer} ({purchase_id})");
        for line in lines {
            println!("{line}");
        }
        Ok(())
    }
}

/// Notifier that only logs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn stock_empty(&self, product_name: &str) {
        warn!(product = product_name, "stock has reached zero");
    }
}
