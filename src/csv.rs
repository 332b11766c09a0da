use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::{BuyerId, Credits, ProductId, ShopCommand};
use crate::model::Product;

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{cmd_type}'")]
    UnrecognizedType { line: usize, cmd_type: String },

    #[error("line {line}: {cmd_type} missing {field}")]
    MissingField {
        line: usize,
        cmd_type: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct CommandRow {
    r#type: String,
    buyer: BuyerId,
    product: Option<ProductId>,
    quantity: Option<u32>,
    discount: Option<String>,
    amount: Option<u64>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: ProductId,
    name: String,
    unit_price: u64,
}

#[derive(Debug, Serialize)]
struct BalanceRow {
    buyer: BuyerId,
    credits: String,
    blacklisted: bool,
}

/// Read shop commands from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> impl Iterator<Item = Result<ShopCommand, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<CommandRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let missing = |cmd_type: &str, field: &'static str| CsvError::MissingField {
                line,
                cmd_type: cmd_type.to_string(),
                field,
            };
            match row.r#type.as_str() {
                "grant" => {
                    let amount = row.amount.ok_or_else(|| missing("grant", "amount"))?;
                    Ok(ShopCommand::Grant {
                        buyer: row.buyer,
                        amount: Credits::new(amount),
                    })
                }
                "redeem" => {
                    let code = row
                        .code
                        .filter(|c| !c.is_empty())
                        .ok_or_else(|| missing("redeem", "code"))?;
                    Ok(ShopCommand::Redeem {
                        buyer: row.buyer,
                        code,
                    })
                }
                "purchase" => {
                    let product = row.product.ok_or_else(|| missing("purchase", "product"))?;
                    let quantity = row
                        .quantity
                        .ok_or_else(|| missing("purchase", "quantity"))?;
                    Ok(ShopCommand::Purchase {
                        buyer: row.buyer,
                        product,
                        quantity,
                        discount: row.discount.filter(|d| !d.is_empty()),
                    })
                }
                "blacklist" => Ok(ShopCommand::Blacklist { buyer: row.buyer }),
                "unblacklist" => Ok(ShopCommand::Unblacklist { buyer: row.buyer }),
                other => Err(CsvError::UnrecognizedType {
                    line,
                    cmd_type: other.to_string(),
                }),
            }
        })
}

/// Read the product catalog from a csv file. Stock starts at zero and is
/// reconciled from the inventory files afterwards.
pub fn read_catalog(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Product, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<CatalogRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            Ok(Product {
                id: row.id,
                name: row.name,
                unit_price: Credits::new(row.unit_price),
                stock: 0,
            })
        })
}

/// write buyer balances to stdout in csv format
pub fn write_balances(accounts: impl IntoIterator<Item = (BuyerId, Credits, bool)>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for (buyer, credits, blacklisted) in accounts {
        let row = BalanceRow {
            buyer,
            credits: credits.to_string(),
            blacklisted,
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
