//! Keyword registry: a typed proxy over the remote keyword store.
//!
//! Every mutation is followed by a full re-list, so the snapshot always mirrors the
//! last successful fetch and nothing is patched locally.

use crate::api::KeywordApi;
use crate::error::{ConsoleError, Result};
use crate::model::{Keyword, KeywordId};
use std::sync::Arc;
use tracing::{debug, info};

/// Split comma-separated input into trimmed, non-empty keywords.
/// Duplicates are kept; the store decides what is new.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// What a bulk add submitted and what the store accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAddOutcome {
    pub submitted: Vec<String>,
    pub added: Vec<String>,
}

pub struct KeywordRegistry<A: KeywordApi> {
    api: Arc<A>,
    snapshot: Vec<Keyword>,
}

impl<A: KeywordApi> KeywordRegistry<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            snapshot: Vec::new(),
        }
    }

    /// Current snapshot, in store order.
    pub fn list(&self) -> &[Keyword] {
        &self.snapshot
    }

    pub fn active_count(&self) -> usize {
        self.snapshot.iter().filter(|k| k.active).count()
    }

    pub async fn refresh(&mut self) -> Result<&[Keyword]> {
        self.snapshot = self.api.list_keywords().await?;
        debug!(count = self.snapshot.len(), "keyword snapshot refreshed");
        Ok(&self.snapshot)
    }

    pub async fn bulk_add(&mut self, raw: &str) -> Result<BulkAddOutcome> {
        let submitted = parse_keywords(raw);
        if submitted.is_empty() {
            return Err(ConsoleError::EmptyInput);
        }
        let added = self.api.add_keywords(&submitted).await?;
        info!(
            submitted = submitted.len(),
            added = added.len(),
            "keywords submitted"
        );
        self.refresh().await?;
        Ok(BulkAddOutcome { submitted, added })
    }

    pub async fn toggle(&mut self, id: KeywordId) -> Result<()> {
        self.api.toggle_keyword(id).await?;
        info!(keyword_id = %id, "keyword toggled");
        self.refresh().await?;
        Ok(())
    }

    pub async fn remove(&mut self, id: KeywordId) -> Result<()> {
        self.api.delete_keyword(id).await?;
        info!(keyword_id = %id, "keyword removed");
        self.refresh().await?;
        Ok(())
    }
}
