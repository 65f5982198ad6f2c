use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a feed entry. Independent of screen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Sentinel returned for slots that carry no data (e.g. a footer).
    pub const INVALID: ItemId = ItemId(-1);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visual flavour of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Text,
    ImageText,
    Video,
}

impl CardKind {
    pub const ALL: [CardKind; 3] = [CardKind::Text, CardKind::ImageText, CardKind::Video];

    /// Dense index used by lookup tables keyed by kind.
    pub fn index(self) -> usize {
        match self {
            CardKind::Text => 0,
            CardKind::ImageText => 1,
            CardKind::Video => 2,
        }
    }
}

/// A single card record supplied by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: ItemId,
    pub title: String,
    pub content: String,
    pub kind: CardKind,
    /// Image location for image cards, stream location for video cards.
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default = "default_span")]
    pub span_size: u8,
}

fn default_span() -> u8 {
    1
}

impl FeedItem {
    pub fn new(id: ItemId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            kind: CardKind::Text,
            media_url: None,
            span_size: 1,
        }
    }

    pub fn with_kind(mut self, kind: CardKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_media(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    /// Returns the playable media reference, if this item has one.
    ///
    /// Only video cards are playable, and an empty URL counts as absent.
    pub fn media_ref(&self) -> Option<&str> {
        if self.kind != CardKind::Video {
            return None;
        }
        self.media_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}
