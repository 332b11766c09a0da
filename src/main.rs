use std::env;
use std::sync::Arc;

use shop_eng::csv::{read_catalog, read_commands, write_balances};
use shop_eng::delivery::{LogNotifier, StdoutDelivery};
use shop_eng::{Engine, InventoryStore, Ledger};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let usage = "usage: shop-eng <catalog.csv> <commands.csv> <stock_dir>";
    let catalog_path = args.next().expect(usage);
    let commands_path = args.next().expect(usage);
    let stock_dir = args.next().expect(usage);

    let ledger = Ledger::new();
    for result in read_catalog(&catalog_path) {
        match result {
            Ok(product) => {
                if let Err(e) = ledger.insert_product(product) {
                    warn!("{e}");
                }
            }
            Err(e) => warn!("{e}"),
        }
    }

    let inventory = InventoryStore::open(&stock_dir)
        .await
        .expect("failed to open stock directory");

    let engine = Engine::new(
        ledger,
        inventory,
        Arc::new(StdoutDelivery),
        Arc::new(LogNotifier),
    );

    // Stock counts come from the inventory files, not the catalog.
    let products = engine.ledger().products();
    for product in &products {
        if let Err(e) = engine.reconcile_stock(product.id).await {
            warn!("{e}");
        }
    }

    let (cmd_sender, cmd_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in read_commands(&commands_path) {
            match result {
                Ok(cmd) => {
                    cmd_sender.send(cmd).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(cmd_receiver)).await;

    write_balances(
        engine
            .ledger()
            .accounts()
            .into_iter()
            .map(|a| (a.buyer, a.credits, a.blacklisted)),
    );
}
