use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{CardKind, FeedConfig, FeedError, FeedItem, ItemId, Result};

/// Position-indexed access to the ordered card records.
pub trait FeedSource {
    /// Returns the id shown at `position`, or [`ItemId::INVALID`] for slots
    /// that carry no data.
    fn item_id_for_position(&self, position: usize) -> ItemId;

    fn item_at(&self, position: usize) -> Option<&FeedItem>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generates deterministic feed pages in place of a remote service.
#[derive(Debug, Clone)]
pub struct FeedRepository {
    config: FeedConfig,
}

impl FeedRepository {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// First screen of data.
    pub fn load_initial(&self) -> Vec<FeedItem> {
        self.generate(0, self.config.initial_count)
    }

    /// Pull-to-refresh replacement page.
    pub fn refresh(&self) -> Vec<FeedItem> {
        self.generate(self.config.refresh_base_id, self.config.initial_count)
    }

    /// Next page starting at id `offset`.
    pub fn load_more(&self, offset: i64) -> Vec<FeedItem> {
        self.generate(offset, self.config.page_size)
    }

    fn generate(&self, start_id: i64, count: usize) -> Vec<FeedItem> {
        (0..count as i64)
            .map(|i| self.item(start_id + i))
            .collect()
    }

    fn item(&self, id: i64) -> FeedItem {
        let kind = self.kind_for(id);
        let base = FeedItem::new(
            ItemId(id),
            format!("Title {id}"),
            format!("Feed summary for item {id}"),
        )
        .with_kind(kind);

        match kind {
            CardKind::Text => base,
            CardKind::ImageText => base.with_media(format!("https://media.example/img/{id}.jpg")),
            CardKind::Video => base.with_media(format!("https://media.example/video/{id}.mp4")),
        }
    }

    fn kind_for(&self, id: i64) -> CardKind {
        let slot = id.unsigned_abs() as usize + 1;
        let every = |n: usize| n > 0 && slot % n == 0;
        if every(self.config.video_every) {
            CardKind::Video
        } else if every(self.config.image_every) {
            CardKind::ImageText
        } else {
            CardKind::Text
        }
    }
}

/// In-memory ordered list of cards backing the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedList {
    items: Vec<FeedItem>,
}

impl FeedList {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn set_items(&mut self, items: Vec<FeedItem>) {
        self.items = items;
    }

    /// Appends a page and returns the position of its first item.
    pub fn append_items(&mut self, items: Vec<FeedItem>) -> usize {
        let start = self.items.len();
        self.items.extend(items);
        start
    }

    /// Removes the card at `position`, returning it if the position was valid.
    pub fn remove_at(&mut self, position: usize) -> Option<FeedItem> {
        (position < self.items.len()).then(|| self.items.remove(position))
    }

    /// Id one past the largest id currently held.
    pub fn next_id(&self) -> i64 {
        self.items
            .iter()
            .map(|item| item.id.0 + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Local JSON snapshot of the feed list, kept in a single file.
#[derive(Debug, Clone)]
pub struct FeedCache {
    path: PathBuf,
}

impl FeedCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `items` as the new snapshot. An empty list clears the cache.
    pub fn save(&self, items: &[FeedItem]) -> Result<()> {
        if items.is_empty() {
            tracing::debug!(path = %self.path.display(), "empty feed, clearing cache");
            return self.clear();
        }
        let json = serde_json::to_string(items).map_err(|err| FeedError::msg(err.to_string()))?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), size = items.len(), "feed cache saved");
        Ok(())
    }

    /// Reads the snapshot. A missing or empty file yields no items; an
    /// unreadable snapshot is cleared and also yields no items.
    pub fn load(&self) -> Result<Vec<FeedItem>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<FeedItem>>(&json) {
            Ok(items) => {
                tracing::debug!(path = %self.path.display(), size = items.len(), "feed cache loaded");
                Ok(items)
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "corrupt feed cache, clearing");
                self.clear()?;
                Ok(Vec::new())
            }
        }
    }

    pub fn has_cache(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    /// Removes the snapshot. Clearing an absent cache is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

impl FeedSource for FeedList {
    fn item_id_for_position(&self, position: usize) -> ItemId {
        self.items
            .get(position)
            .map(|item| item.id)
            .unwrap_or(ItemId::INVALID)
    }

    fn item_at(&self, position: usize) -> Option<&FeedItem> {
        self.items.get(position)
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
