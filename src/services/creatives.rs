//! Account creative documents: ordered blocks of ad copy and uploaded visuals.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Store;
use crate::clients::storage::StorageClient;

const MAX_BLOCKS_PER_SAVE: usize = 50;
const MAX_TEXT_BLOCK_CHARS: usize = 10_000;

#[derive(Debug, Error)]
pub enum CreativeError {
    #[error("No blocks provided")]
    Empty,

    #[error("Too many blocks in one save: {0} (max {MAX_BLOCKS_PER_SAVE})")]
    TooManyBlocks(usize),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for CreativeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// A creative document is a JSON array of tagged blocks; only known kinds
/// are accepted at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreativeBlock {
    Text { content: String },
    Image { key: String, url: String },
}

impl CreativeBlock {
    fn validate(&self) -> Result<(), CreativeError> {
        match self {
            Self::Text { content } => {
                if content.trim().is_empty() {
                    return Err(CreativeError::InvalidBlock("empty text block".to_string()));
                }
                if content.chars().count() > MAX_TEXT_BLOCK_CHARS {
                    return Err(CreativeError::InvalidBlock(format!(
                        "text block exceeds {MAX_TEXT_BLOCK_CHARS} characters"
                    )));
                }
            }
            Self::Image { key, url } => {
                if key.trim().is_empty() || url.trim().is_empty() {
                    return Err(CreativeError::InvalidBlock(
                        "image block requires key and url".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct CreativeService {
    store: Store,
    storage: Option<Arc<StorageClient>>,
}

impl CreativeService {
    #[must_use]
    pub const fn new(store: Store, storage: Option<Arc<StorageClient>>) -> Self {
        Self { store, storage }
    }

    /// Appends validated blocks to the account's document, creating the
    /// document on first save. Returns the new total block count.
    pub async fn save(
        &self,
        account_id: i32,
        blocks: Vec<CreativeBlock>,
    ) -> Result<usize, CreativeError> {
        if blocks.is_empty() {
            return Err(CreativeError::Empty);
        }
        if blocks.len() > MAX_BLOCKS_PER_SAVE {
            return Err(CreativeError::TooManyBlocks(blocks.len()));
        }
        for block in &blocks {
            block.validate()?;
        }

        let values = blocks
            .into_iter()
            .map(|block| {
                serde_json::to_value(block)
                    .map_err(|err| CreativeError::Database(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total = self.store.append_creative_blocks(account_id, values).await?;
        info!(account_id, total, "Saved creative blocks");
        Ok(total)
    }

    pub async fn get(&self, account_id: i32) -> Result<Vec<CreativeBlock>, CreativeError> {
        let Some(raw) = self.store.get_creative_blocks(account_id).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_value(raw).map_err(|err| CreativeError::Database(err.to_string()))
    }

    /// Removes the document and any stored objects its image blocks point
    /// at. Storage failures are logged, not fatal; the row is already gone.
    pub async fn delete_for_account(&self, account_id: i32) -> Result<(), CreativeError> {
        let Some(raw) = self.store.delete_account_creatives(account_id).await? else {
            return Ok(());
        };

        let Some(storage) = &self.storage else {
            return Ok(());
        };

        let blocks: Vec<CreativeBlock> = match serde_json::from_value(raw) {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(account_id, %err, "Skipping storage cascade for undecodable blocks");
                return Ok(());
            }
        };

        for block in blocks {
            if let CreativeBlock::Image { key, .. } = block {
                if let Err(err) = storage.delete(&key).await {
                    warn!(account_id, key, %err, "Failed to delete stored creative object");
                }
            }
        }

        Ok(())
    }
}
