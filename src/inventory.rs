//! Inventory file store.
//!
//! One newline-delimited file per product (`stock_<id>.txt` under a root
//! directory), one line per sellable unit. Lines are opaque text; blank
//! lines are tolerated on read and skipped. Peeking and removing are two
//! separate operations so the purchase engine can hand lines to the buyer
//! before committing their removal; callers must serialize peek/remove
//! pairs per product, which the engine's product lock guarantees.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::model::ProductId;

/// Error from an inventory file operation.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("not enough inventory lines: requested {requested}, available {available}")]
    NotEnoughLines { requested: u32, available: u32 },

    #[error("inventory lines must not contain newlines")]
    EmbeddedNewline,

    #[error("inventory file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed store of per-product inventory lines.
pub struct InventoryStore {
    root: PathBuf,
}

impl InventoryStore {
    /// Use `root` as the inventory directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(InventoryStore { root })
    }

    pub fn path_for(&self, product: ProductId) -> PathBuf {
        self.root.join(format!("stock_{product}.txt"))
    }

    /// Read the first `n` lines without removing them.
    pub async fn peek(&self, product: ProductId, n: u32) -> Result<Vec<String>, InventoryError> {
        let lines = self.read_lines(&self.path_for(product)).await?;
        if (lines.len() as u32) < n {
            return Err(InventoryError::NotEnoughLines {
                requested: n,
                available: lines.len() as u32,
            });
        }
        Ok(lines.into_iter().take(n as usize).collect())
    }

    /// Remove the first `n` lines. The caller has already peeked them and
    /// holds the product lock, so the head of the file is unchanged since
    /// the peek.
    pub async fn remove(&self, product: ProductId, n: u32) -> Result<(), InventoryError> {
        let path = self.path_for(product);
        let lines = self.read_lines(&path).await?;
        if (lines.len() as u32) < n {
            return Err(InventoryError::NotEnoughLines {
                requested: n,
                available: lines.len() as u32,
            });
        }
        let remaining = &lines[n as usize..];
        let mut contents = remaining.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        tokio::fs::write(&path, contents).await?;
        Ok(())
    }

    /// Append restock lines; returns how many were added. Rejects lines
    /// that are blank or contain a newline, since one line is one unit.
    pub async fn append(&self, product: ProductId, lines: &[String]) -> Result<u32, InventoryError> {
        let mut buf = String::new();
        let mut added = 0u32;
        for line in lines {
            if line.contains('\n') || line.contains('\r') {
                return Err(InventoryError::EmbeddedNewline);
            }
            if line.trim().is_empty() {
                continue;
            }
            buf.push_str(line);
            buf.push('\n');
            added += 1;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path_for(product))
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(added)
    }

    /// Count sellable lines; a missing file means zero stock.
    pub async fn count_lines(&self, product: ProductId) -> Result<u32, InventoryError> {
        Ok(self.read_lines(&self.path_for(product)).await?.len() as u32)
    }

    async fn read_lines(&self, path: &Path) -> Result<Vec<String>, InventoryError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (InventoryStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = InventoryStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn append_then_count() {
        let (store, _dir) = store().await;
        let added = store.append(1, &lines(&["key-1", "key-2", "key-3"])).await.unwrap();
        assert_eq!(added, 3);
        assert_eq!(store.count_lines(1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_file_counts_as_empty() {
        let (store, _dir) = store().await;
        assert_eq!(store.count_lines(42).await.unwrap(), 0);
        assert!(matches!(
            store.peek(42, 1).await,
            Err(InventoryError::NotEnoughLines {
                requested: 1,
                available: 0
            })
        ));
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let (store, _dir) = store().await;
        store.append(1, &lines(&["a", "b", "c"])).await.unwrap();

        let peeked = store.peek(1, 2).await.unwrap();
        assert_eq!(peeked, lines(&["a", "b"]));
        assert_eq!(store.count_lines(1).await.unwrap(), 3);

        // A second peek sees the same head.
        assert_eq!(store.peek(1, 2).await.unwrap(), lines(&["a", "b"]));
    }

    #[tokio::test]
    async fn remove_drops_exactly_the_head() {
        let (store, _dir) = store().await;
        store.append(1, &lines(&["a", "b", "c", "d"])).await.unwrap();

        store.remove(1, 2).await.unwrap();
        assert_eq!(store.peek(1, 2).await.unwrap(), lines(&["c", "d"]));
        assert_eq!(store.count_lines(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_everything_leaves_empty_file() {
        let (store, _dir) = store().await;
        store.append(1, &lines(&["a"])).await.unwrap();
        store.remove(1, 1).await.unwrap();
        assert_eq!(store.count_lines(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_more_than_available_fails_untouched() {
        let (store, _dir) = store().await;
        store.append(1, &lines(&["a", "b"])).await.unwrap();

        assert!(matches!(
            store.remove(1, 3).await,
            Err(InventoryError::NotEnoughLines {
                requested: 3,
                available: 2
            })
        ));
        assert_eq!(store.count_lines(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (store, _dir) = store().await;
        tokio::fs::write(store.path_for(1), "a\n\n   \nb\n").await.unwrap();
        assert_eq!(store.count_lines(1).await.unwrap(), 2);
        assert_eq!(store.peek(1, 2).await.unwrap(), lines(&["a", "b"]));
    }

    #[tokio::test]
    async fn append_skips_blank_and_rejects_newlines() {
        let (store, _dir) = store().await;
        let added = store.append(1, &lines(&["a", "", "  ", "b"])).await.unwrap();
        assert_eq!(added, 2);

        assert!(matches!(
            store.append(1, &lines(&["one\ntwo"])).await,
            Err(InventoryError::EmbeddedNewline)
        ));
    }

    #[tokio::test]
    async fn products_have_independent_files() {
        let (store, _dir) = store().await;
        store.append(1, &lines(&["a"])).await.unwrap();
        store.append(2, &lines(&["x", "y"])).await.unwrap();

        store.remove(2, 1).await.unwrap();
        assert_eq!(store.count_lines(1).await.unwrap(), 1);
        assert_eq!(store.count_lines(2).await.unwrap(), 1);
    }
}
