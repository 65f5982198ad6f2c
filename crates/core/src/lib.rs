//! Core library for tracking card exposure in a scrolling feed and
//! coordinating a single shared video player across the feed's cards.
//!
//! The two subsystems are deliberately independent. [`ExposureEngine`]
//! turns geometry snapshots into discrete visibility events, while
//! [`PlaybackCoordinator`] owns the one player instance and decides which
//! sink it is bound to. [`FeedSession`] wires both to a simulated list
//! layout the way a hosting screen would.

pub mod cards;
pub mod config;
pub mod data;
pub mod error;
pub mod exposure;
pub mod layout;
pub mod model;
pub mod playback;
pub mod session;

pub use cards::{binder_for, CardBinder, CardVisual};
pub use config::{AppConfig, FeedConfig, ViewportConfig};
pub use data::{FeedCache, FeedList, FeedRepository, FeedSource};
pub use error::{FeedError, Result};
pub use exposure::{
    ExposureEngine, ExposureEvent, ExposureEventKind, ExposureState, VisibleGeometry,
    FULLY_VISIBLE_THRESHOLD, HALF_VISIBLE_THRESHOLD,
};
pub use layout::{LinearLayout, SinkPool, SlotGeometry};
pub use model::{CardKind, FeedItem, ItemId};
pub use playback::{
    most_centered, MediaCapability, PlaybackBinding, PlaybackCandidate, PlaybackCoordinator,
    PlayerCall, ScrollState, SimulatedPlayer, SinkId,
};
pub use session::FeedSession;
