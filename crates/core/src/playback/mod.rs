//! Single-instance playback coordination.
//!
//! One [`MediaCapability`] exists per hosting screen. The
//! [`PlaybackCoordinator`] owns it and is the only place that attaches,
//! detaches, loads, plays or pauses it, so at most one sink ever holds the
//! player.

mod simulated;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{FeedError, FeedItem, ItemId, Result};

pub use simulated::{PlayerCall, SimulatedPlayer};

/// Handle of a visual slot able to host the player's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkId(pub u32);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// The media decode/render pipeline as seen by the coordinator.
pub trait MediaCapability {
    fn attach(&mut self, sink: SinkId);
    fn detach(&mut self);
    /// Prepares `media_ref` for playback from the beginning.
    fn load(&mut self, media_ref: &str) -> Result<()>;
    /// Starts or resumes playback.
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    fn attached_sink(&self) -> Option<SinkId>;
    /// Tears the pipeline down for good.
    fn release(&mut self);
}

/// Which sink currently owns the player, and for which item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackBinding {
    pub sink: SinkId,
    pub item_id: ItemId,
}

/// Scroll signal reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollState {
    #[default]
    Idle,
    Dragging,
    Settling,
}

impl ScrollState {
    pub fn is_moving(self) -> bool {
        !matches!(self, ScrollState::Idle)
    }
}

/// A realized card that could take the player on scroll-settle.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackCandidate<'a> {
    pub sink: SinkId,
    pub item: &'a FeedItem,
    /// Top edge relative to the viewport.
    pub top: f32,
    /// Bottom edge relative to the viewport.
    pub bottom: f32,
}

impl PlaybackCandidate<'_> {
    fn distance_to(&self, center: f32) -> f32 {
        ((self.top + self.bottom) * 0.5 - center).abs()
    }
}

/// Picks the playable candidate whose vertical center is closest to the
/// viewport's center. Ties go to the earlier candidate.
pub fn most_centered<'c, 'a>(
    candidates: &'c [PlaybackCandidate<'a>],
    viewport_height: f32,
) -> Option<&'c PlaybackCandidate<'a>> {
    let center = viewport_height * 0.5;
    let mut best: Option<(&PlaybackCandidate<'a>, f32)> = None;

    for candidate in candidates {
        if candidate.item.media_ref().is_none() {
            continue;
        }
        let distance = candidate.distance_to(center);
        if distance.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((candidate, distance));
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Owns the shared player and decides which sink it is bound to.
///
/// Dropping the coordinator releases the player if [`release`] has not
/// been called yet.
///
/// [`release`]: PlaybackCoordinator::release
pub struct PlaybackCoordinator<P: MediaCapability> {
    player: P,
    binding: Option<PlaybackBinding>,
    scroll_state: ScrollState,
    released: bool,
}

impl<P: MediaCapability> PlaybackCoordinator<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            binding: None,
            scroll_state: ScrollState::Idle,
            released: false,
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn binding(&self) -> Option<PlaybackBinding> {
        self.binding
    }

    pub fn bound_item(&self) -> Option<ItemId> {
        self.binding.map(|binding| binding.item_id)
    }

    pub fn is_playing(&self) -> bool {
        !self.released && self.player.is_playing()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.scroll_state
    }

    /// Binds the player to `sink` and plays `item` from the beginning.
    ///
    /// Items without a playable media reference only detach the player.
    /// A load failure leaves the player detached and unbound and is
    /// returned as [`FeedError::Media`].
    pub fn bind_and_play(&mut self, sink: SinkId, item: &FeedItem) -> Result<()> {
        if self.released {
            tracing::debug!(%sink, item_id = %item.id, "ignoring bind after release");
            return Ok(());
        }

        let Some(media_ref) = item.media_ref() else {
            tracing::debug!(%sink, item_id = %item.id, "no playable media, detaching");
            self.unbind();
            return Ok(());
        };

        if self.player.attached_sink() != Some(sink) {
            if let Some(previous) = self.player.attached_sink() {
                tracing::debug!(from = %previous, to = %sink, "rebinding player");
                self.player.pause();
                self.player.detach();
            }
            self.player.attach(sink);
        }

        if let Err(err) = self.player.load(media_ref) {
            tracing::warn!(item_id = %item.id, error = %err, "media load failed");
            self.unbind();
            return Err(match err {
                err @ FeedError::Media { .. } => err,
                other => FeedError::media(item.id, other.to_string()),
            });
        }

        self.player.play();
        self.binding = Some(PlaybackBinding {
            sink,
            item_id: item.id,
        });
        tracing::debug!(%sink, item_id = %item.id, "playing");
        Ok(())
    }

    /// Flips play/pause when `(sink, item)` is the current binding,
    /// otherwise switches to it and restarts from the beginning.
    pub fn toggle_play(&mut self, sink: SinkId, item: &FeedItem) -> Result<()> {
        let current = PlaybackBinding {
            sink,
            item_id: item.id,
        };
        if self.released || self.binding != Some(current) {
            return self.bind_and_play(sink, item);
        }

        if self.player.is_playing() {
            self.player.pause();
        } else {
            self.player.play();
        }
        tracing::debug!(%sink, item_id = %item.id, playing = self.player.is_playing(), "toggled");
        Ok(())
    }

    /// Pauses without touching the binding.
    pub fn pause(&mut self) {
        if !self.released {
            self.player.pause();
        }
    }

    /// Pauses only if `item_id` is the bound item. Returns whether it was.
    pub fn pause_if_matching(&mut self, item_id: ItemId) -> bool {
        if self.bound_item() != Some(item_id) {
            return false;
        }
        tracing::debug!(%item_id, "bound item disappeared, pausing");
        self.pause();
        true
    }

    /// Called when `sink` is reclaimed for another item. Unbinds the player
    /// if it was attached there. Returns whether it was.
    pub fn on_sink_recycled(&mut self, sink: SinkId) -> bool {
        match self.binding {
            Some(binding) if binding.sink == sink => {
                tracing::debug!(%sink, item_id = %binding.item_id, "bound sink recycled");
                self.unbind();
                true
            }
            _ => false,
        }
    }

    /// Records a scroll-state change. Moving pauses unconditionally; coming
    /// to rest from motion autoplays the most centered candidate.
    ///
    /// Returns the item bound after the call, if any.
    pub fn on_scroll_state_changed(
        &mut self,
        state: ScrollState,
        candidates: &[PlaybackCandidate<'_>],
        viewport_height: f32,
    ) -> Result<Option<ItemId>> {
        let previous = std::mem::replace(&mut self.scroll_state, state);

        if state.is_moving() {
            self.pause();
        } else if previous.is_moving() {
            self.autoplay(candidates, viewport_height)?;
        }
        Ok(self.bound_item())
    }

    /// Binds and plays the most centered playable candidate.
    ///
    /// When that candidate is already bound it resumes in place instead of
    /// restarting. Returns the chosen item.
    pub fn autoplay(
        &mut self,
        candidates: &[PlaybackCandidate<'_>],
        viewport_height: f32,
    ) -> Result<Option<ItemId>> {
        if self.released {
            return Ok(None);
        }
        let Some(chosen) = most_centered(candidates, viewport_height) else {
            return Ok(None);
        };

        let target = PlaybackBinding {
            sink: chosen.sink,
            item_id: chosen.item.id,
        };
        if self.binding == Some(target) {
            self.player.play();
        } else {
            self.bind_and_play(chosen.sink, chosen.item)?;
        }
        Ok(Some(chosen.item.id))
    }

    /// Tears the player down and clears the binding.
    pub fn release(&mut self) {
        if !self.released {
            tracing::debug!(binding = ?self.binding, "releasing player");
            self.player.release();
            self.released = true;
        }
        self.binding = None;
    }

    fn unbind(&mut self) {
        if self.player.attached_sink().is_some() {
            self.player.pause();
            self.player.detach();
        }
        self.binding = None;
    }
}

impl<P: MediaCapability> Drop for PlaybackCoordinator<P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P: MediaCapability + fmt::Debug> fmt::Debug for PlaybackCoordinator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("player", &self.player)
            .field("binding", &self.binding)
            .field("scroll_state", &self.scroll_state)
            .field("released", &self.released)
            .finish()
    }
}
