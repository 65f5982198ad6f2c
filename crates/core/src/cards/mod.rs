//! Card binders, one per [`CardKind`], resolved through a static table.

use serde::{Deserialize, Serialize};

use crate::{CardKind, FeedItem};

const VIDEO_HINT: &str = "tap the video to pause or resume";

/// Rendered contents of one card slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardVisual {
    pub kind: Option<CardKind>,
    pub title: String,
    pub body: String,
    /// Secondary line shown under the body, if any.
    pub caption: Option<String>,
    /// Whether this visual can host the shared media output.
    pub hosts_media: bool,
    pub position: Option<usize>,
}

/// Handler for one card kind.
pub trait CardBinder: Sync {
    fn kind(&self) -> CardKind;

    /// Builds an empty visual for this kind.
    fn create_visual(&self) -> CardVisual {
        CardVisual {
            kind: Some(self.kind()),
            ..CardVisual::default()
        }
    }

    /// Fills `visual` with the data of `item` shown at `position`.
    fn bind(&self, visual: &mut CardVisual, item: &FeedItem, position: usize);

    /// Number of grid columns the card occupies.
    fn span_size(&self, item: &FeedItem) -> u8 {
        item.span_size.max(1)
    }
}

#[derive(Debug)]
pub struct TextCardBinder;

impl CardBinder for TextCardBinder {
    fn kind(&self) -> CardKind {
        CardKind::Text
    }

    fn bind(&self, visual: &mut CardVisual, item: &FeedItem, position: usize) {
        visual.title = item.title.clone();
        visual.body = item.content.clone();
        visual.caption = None;
        visual.position = Some(position);
    }
}

#[derive(Debug)]
pub struct ImageTextCardBinder;

impl CardBinder for ImageTextCardBinder {
    fn kind(&self) -> CardKind {
        CardKind::ImageText
    }

    fn bind(&self, visual: &mut CardVisual, item: &FeedItem, position: usize) {
        visual.title = item.title.clone();
        visual.body = item.content.clone();
        visual.caption = item.media_url.clone();
        visual.position = Some(position);
    }
}

#[derive(Debug)]
pub struct VideoCardBinder;

impl CardBinder for VideoCardBinder {
    fn kind(&self) -> CardKind {
        CardKind::Video
    }

    fn create_visual(&self) -> CardVisual {
        CardVisual {
            kind: Some(CardKind::Video),
            hosts_media: true,
            ..CardVisual::default()
        }
    }

    fn bind(&self, visual: &mut CardVisual, item: &FeedItem, position: usize) {
        visual.title = format!("[video] {}", item.title);
        visual.body = item.content.clone();
        visual.caption = Some(VIDEO_HINT.to_string());
        visual.position = Some(position);
    }
}

static BINDERS: [&dyn CardBinder; 3] = [&TextCardBinder, &ImageTextCardBinder, &VideoCardBinder];

/// Returns the binder registered for `kind`.
pub fn binder_for(kind: CardKind) -> &'static dyn CardBinder {
    BINDERS[kind.index()]
}

/// Creates and binds a visual for `item` in one step.
pub fn render(item: &FeedItem, position: usize) -> CardVisual {
    let binder = binder_for(item.kind);
    let mut visual = binder.create_visual();
    binder.bind(&mut visual, item, position);
    visual
}
