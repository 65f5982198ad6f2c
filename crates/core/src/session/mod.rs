//! Host glue for one feed screen.
//!
//! [`FeedSession`] plays the part of the screen that owns the list: it runs
//! a layout pass after every scroll or data change, reports reclaimed sinks
//! to the coordinator, feeds the geometry snapshot to the exposure engine
//! and routes `Disappear` events to [`PlaybackCoordinator::pause_if_matching`].

use std::collections::BTreeSet;

use crate::{
    cards, AppConfig, CardKind, CardVisual, ExposureEngine, ExposureEvent, ExposureEventKind,
    FeedCache, FeedConfig, FeedItem, FeedList, FeedRepository, FeedSource, ItemId, LinearLayout,
    MediaCapability, PlaybackCandidate, PlaybackCoordinator, Result, ScrollState, SinkPool,
    SlotGeometry, ViewportConfig, VisibleGeometry,
};

/// One feed screen: the card list with its simulated layout, plus the exposure
/// and playback state driven by scrolling over it.
///
/// Every mutation (scroll, refresh, load more, remove) ends in a layout pass
/// and returns the exposure events it produced.
pub struct FeedSession<P: MediaCapability> {
    repository: FeedRepository,
    cache: Option<FeedCache>,
    list: FeedList,
    layout: LinearLayout,
    viewport: ViewportConfig,
    sinks: SinkPool,
    exposure: ExposureEngine,
    coordinator: PlaybackCoordinator<P>,
    realized: Vec<SlotGeometry>,
}

impl<P: MediaCapability> FeedSession<P> {
    /// Builds a session over the cached feed, or the repository's first page
    /// when there is no cache. No layout pass runs until [`start`](Self::start).
    pub fn new(config: &AppConfig, player: P) -> Self {
        let repository = FeedRepository::new(config.feed.clone());
        let cache = config.feed.cache_path.as_deref().map(FeedCache::new);

        let cached = match cache.as_ref().map(FeedCache::load) {
            Some(Ok(items)) => items,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "feed cache unreadable, starting fresh");
                Vec::new()
            }
            None => Vec::new(),
        };
        let items = if cached.is_empty() {
            repository.load_initial()
        } else {
            tracing::info!(size = cached.len(), "restored feed from cache");
            cached
        };
        let list = FeedList::new(items);
        let layout = LinearLayout::for_source(&list, &config.feed);

        let session = Self {
            repository,
            cache,
            list,
            layout,
            viewport: config.viewport.clone(),
            sinks: SinkPool::new(),
            exposure: ExposureEngine::new(),
            coordinator: PlaybackCoordinator::new(player),
            realized: Vec::new(),
        };
        session.persist();
        session
    }

    pub fn list(&self) -> &FeedList {
        &self.list
    }

    pub fn layout(&self) -> &LinearLayout {
        &self.layout
    }

    pub fn exposure(&self) -> &ExposureEngine {
        &self.exposure
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator<P> {
        &self.coordinator
    }

    pub fn sinks(&self) -> &SinkPool {
        &self.sinks
    }

    /// Slots realized by the latest layout pass.
    pub fn realized(&self) -> &[SlotGeometry] {
        &self.realized
    }

    /// Renders the realized cards through the binder table, in slot order.
    pub fn visible_cards(&self) -> Vec<CardVisual> {
        self.realized
            .iter()
            .filter_map(|slot| {
                let item = self.list.item_at(slot.position)?;
                Some(cards::render(item, slot.position))
            })
            .collect()
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport.height
    }

    /// First layout pass, followed by autoplay of the most centered video.
    pub fn start(&mut self) -> Result<Vec<ExposureEvent>> {
        let events = self.layout_pass();
        self.autoplay()?;
        Ok(events)
    }

    /// Scrolls the feed by `dy` pixels and returns the resulting events.
    pub fn scroll_by(&mut self, dy: f32) -> Vec<ExposureEvent> {
        let moved = self.layout.scroll_by(dy, self.viewport.height);
        if moved == 0.0 && !self.realized.is_empty() {
            return Vec::new();
        }
        self.layout_pass()
    }

    /// Forwards a scroll-state change; settling autoplays the centered video.
    pub fn set_scroll_state(&mut self, state: ScrollState) -> Result<Option<ItemId>> {
        let candidates = candidates(&self.realized, &self.list, &self.sinks, self.viewport.height);
        self.coordinator
            .on_scroll_state_changed(state, &candidates, self.viewport.height)
    }

    /// Taps the card at `position`. On a realized video card this toggles
    /// playback; anything else is ignored. Returns whether a toggle happened.
    pub fn tap(&mut self, position: usize) -> Result<bool> {
        let Some(item) = self.list.item_at(position) else {
            return Ok(false);
        };
        if item.kind != CardKind::Video {
            return Ok(false);
        }
        let Some(sink) = self.sinks.sink_for(item.id) else {
            return Ok(false);
        };
        self.coordinator.toggle_play(sink, item)?;
        Ok(true)
    }

    /// The hosting screen went to the background.
    pub fn on_host_pause(&mut self) {
        self.coordinator.pause();
    }

    /// Pull-to-refresh: replaces the list and scrolls back to the top.
    pub fn refresh(&mut self) -> Result<Vec<ExposureEvent>> {
        let items = self.repository.refresh();
        self.list.set_items(items);
        self.layout.scroll_to(0.0, self.viewport.height);
        self.persist();
        let events = self.rebuild();
        self.autoplay()?;
        Ok(events)
    }

    /// Appends the next page. Returns how many cards were added.
    pub fn load_more(&mut self) -> (usize, Vec<ExposureEvent>) {
        let page = self.repository.load_more(self.list.next_id());
        let added = page.len();
        self.list.append_items(page);
        self.persist();
        (added, self.rebuild())
    }

    /// Deletes the card at `position`.
    pub fn remove(&mut self, position: usize) -> Option<(FeedItem, Vec<ExposureEvent>)> {
        let removed = self.list.remove_at(position)?;
        let events = self.rebuild();
        Some((removed, events))
    }

    /// Releases the shared player. The session stays inert afterwards.
    pub fn shutdown(&mut self) {
        self.coordinator.release();
    }

    fn autoplay(&mut self) -> Result<Option<ItemId>> {
        let candidates = candidates(&self.realized, &self.list, &self.sinks, self.viewport.height);
        self.coordinator.autoplay(&candidates, self.viewport.height)
    }

    /// Writes the list back to the cache, if one is configured.
    fn persist(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(err) = cache.save(self.list.items()) {
            tracing::warn!(path = %cache.path().display(), error = %err, "failed to save feed cache");
        }
    }

    /// Re-lays out after a data change and drops bookkeeping of cards that
    /// left the list.
    fn rebuild(&mut self) -> Vec<ExposureEvent> {
        let feed: &FeedConfig = self.repository.config();
        self.layout
            .set_heights(LinearLayout::heights_of(&self.list, feed).collect::<Vec<_>>());
        self.layout.scroll_by(0.0, self.viewport.height);

        let events = self.layout_pass();
        let alive: BTreeSet<ItemId> = self.list.items().iter().map(|item| item.id).collect();
        self.exposure.retain(|id| alive.contains(&id));
        events
    }

    fn layout_pass(&mut self) -> Vec<ExposureEvent> {
        self.realized = self.layout.realized_slots(&self.viewport);

        let snapshot: Vec<VisibleGeometry> = self
            .realized
            .iter()
            .filter_map(|slot| slot.to_visible(&self.list))
            .collect();
        let ids: Vec<ItemId> = snapshot.iter().map(|geometry| geometry.item_id).collect();

        for sink in self.sinks.sync(&ids) {
            self.coordinator.on_sink_recycled(sink);
        }

        let events = self.exposure.tick(&snapshot, self.viewport.height);
        for event in &events {
            if event.kind == ExposureEventKind::Disappear {
                self.coordinator.pause_if_matching(event.item_id);
            }
        }
        events
    }
}

/// Realized video cards that hold a sink and show at least one pixel inside
/// the viewport, in slot order. Overscan slots never qualify.
fn candidates<'a>(
    realized: &[SlotGeometry],
    list: &'a FeedList,
    sinks: &SinkPool,
    viewport_height: f32,
) -> Vec<PlaybackCandidate<'a>> {
    realized
        .iter()
        .filter_map(|slot| {
            let item = list.item_at(slot.position)?;
            if item.kind != CardKind::Video {
                return None;
            }
            let visible = slot.to_visible(list)?.visible_ratio(viewport_height);
            if visible <= 0.0 {
                return None;
            }
            let sink = sinks.sink_for(item.id)?;
            Some(PlaybackCandidate {
                sink,
                item,
                top: slot.top,
                bottom: slot.bottom,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExposureState, PlayerCall, SimulatedPlayer};

    /// 100px text cards with every third card a 100px video, 300px viewport.
    fn config() -> AppConfig {
        AppConfig {
            viewport: ViewportConfig {
                height: 300.0,
                overscan: 1,
            },
            feed: FeedConfig {
                initial_count: 12,
                page_size: 6,
                refresh_base_id: 500,
                video_every: 3,
                image_every: 0,
                text_height: 100.0,
                image_height: 100.0,
                video_height: 100.0,
                cache_path: None,
            },
        }
    }

    fn session() -> FeedSession<SimulatedPlayer> {
        FeedSession::new(&config(), SimulatedPlayer::new())
    }

    fn cached_config(name: &str) -> AppConfig {
        let path = std::env::temp_dir().join(format!(
            "feed_exposure_session_{name}_{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut config = config();
        config.feed.cache_path = Some(path);
        config
    }

    fn events_for(events: &[ExposureEvent], id: i64) -> Vec<ExposureEventKind> {
        events
            .iter()
            .filter(|event| event.item_id == ItemId(id))
            .map(|event| event.kind)
            .collect()
    }

    #[test]
    fn start_exposes_first_screen_and_autoplays_centered_video() {
        let mut session = session();
        let events = session.start().unwrap();

        assert_eq!(
            events_for(&events, 0),
            vec![
                ExposureEventKind::Enter,
                ExposureEventKind::OverHalf,
                ExposureEventKind::FullyVisible
            ]
        );
        // Overscan slot at position 3 is realized but not visible.
        assert!(events_for(&events, 3).is_empty());
        assert_eq!(session.exposure().state(ItemId(3)), ExposureState::None);

        // Item 2 is the only realized video.
        assert_eq!(session.coordinator().bound_item(), Some(ItemId(2)));
        assert!(session.coordinator().is_playing());
        assert_eq!(
            session.coordinator().player().media(),
            Some("https://media.example/video/2.mp4")
        );
    }

    #[test]
    fn video_only_in_overscan_does_not_autoplay() {
        let mut config = config();
        config.viewport.height = 200.0;
        let mut session = FeedSession::new(&config, SimulatedPlayer::new());

        session.start().unwrap();
        // Item 2 (200..300) is realized as overscan but shows no pixels.
        assert!(session.realized().iter().any(|slot| slot.position == 2));
        assert_eq!(session.exposure().state(ItemId(2)), ExposureState::None);
        assert_eq!(session.coordinator().binding(), None);
        assert!(!session.coordinator().is_playing());
        assert_eq!(session.coordinator().player().load_count(), 0);

        session.set_scroll_state(ScrollState::Dragging).unwrap();
        assert_eq!(session.set_scroll_state(ScrollState::Idle).unwrap(), None);
        assert!(!session.coordinator().is_playing());
    }

    #[test]
    fn playing_video_scrolled_out_of_view_is_paused_by_disappear() {
        let mut session = session();
        session.start().unwrap();
        assert!(session.coordinator().is_playing());

        let events = session.scroll_by(300.0);
        assert_eq!(events_for(&events, 2), vec![ExposureEventKind::Disappear]);
        assert!(!session.coordinator().is_playing());
        // Still realized as overscan, so the binding survives the pause.
        assert_eq!(session.coordinator().bound_item(), Some(ItemId(2)));
        assert_eq!(session.coordinator().player().calls().last(), Some(&PlayerCall::Pause));
    }

    #[test]
    fn scrolling_bound_video_out_of_view_while_dragging_keeps_it_paused() {
        let mut session = session();
        session.start().unwrap();

        session.set_scroll_state(ScrollState::Dragging).unwrap();
        assert!(!session.coordinator().is_playing());

        let events = session.scroll_by(300.0);
        assert_eq!(events_for(&events, 2), vec![ExposureEventKind::Disappear]);
        assert!(!session.coordinator().is_playing());
        assert_eq!(session.coordinator().bound_item(), Some(ItemId(2)));
    }

    #[test]
    fn far_scroll_recycles_bound_sink() {
        let mut session = session();
        session.start().unwrap();

        session.scroll_by(800.0);
        assert_eq!(session.coordinator().binding(), None);
        assert_eq!(session.coordinator().player().attached_sink(), None);
        assert!(session.coordinator().player().max_attached() <= 1);
    }

    #[test]
    fn settle_picks_video_nearest_center() {
        let mut session = session();
        session.start().unwrap();

        session.set_scroll_state(ScrollState::Dragging).unwrap();
        // Viewport spans content 350..650; item 5 (500..600) is the closest video.
        session.scroll_by(350.0);
        let bound = session.set_scroll_state(ScrollState::Idle).unwrap();

        assert_eq!(bound, Some(ItemId(5)));
        assert!(session.coordinator().is_playing());
    }

    #[test]
    fn tap_toggles_only_video_cards() {
        let mut session = session();
        session.start().unwrap();

        assert!(!session.tap(0).unwrap());
        assert!(session.tap(2).unwrap());
        assert!(!session.coordinator().is_playing());
        assert!(session.tap(2).unwrap());
        assert!(session.coordinator().is_playing());
        assert_eq!(session.coordinator().player().load_count(), 1);
        assert!(!session.tap(99).unwrap());
    }

    #[test]
    fn removing_bound_card_unbinds_and_forgets_it() {
        let mut session = session();
        session.start().unwrap();

        let (removed, events) = session.remove(2).unwrap();
        assert_eq!(removed.id, ItemId(2));
        assert_eq!(events_for(&events, 2), vec![ExposureEventKind::Disappear]);
        assert_eq!(session.coordinator().binding(), None);
        assert_eq!(session.exposure().state(ItemId(2)), ExposureState::None);
        assert!(session.exposure().tracked_len() <= session.list().len());
    }

    #[test]
    fn visible_cards_are_rendered_per_kind() {
        let mut session = session();
        session.start().unwrap();

        let cards = session.visible_cards();
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].title, "Title 0");
        assert_eq!(cards[2].title, "[video] Title 2");
        assert!(cards[2].hosts_media);
        assert_eq!(cards[3].position, Some(3));
    }

    #[test]
    fn load_more_extends_scrollable_content() {
        let mut session = session();
        session.start().unwrap();
        let before = session.layout().content_height();

        let (added, _) = session.load_more();
        assert_eq!(added, 6);
        assert_eq!(session.list().len(), 18);
        assert_eq!(session.layout().content_height(), before + 600.0);
        assert_eq!(session.list().item_id_for_position(12), ItemId(12));
    }

    #[test]
    fn refresh_replaces_items_and_reports_disappearances() {
        let mut session = session();
        session.start().unwrap();

        let events = session.refresh().unwrap();
        assert_eq!(events_for(&events, 0), vec![ExposureEventKind::Disappear]);
        assert!(events_for(&events, 500).contains(&ExposureEventKind::Enter));
        // Item 500 is a video centered nearer than the overscan video 503.
        assert_eq!(session.coordinator().bound_item(), Some(ItemId(500)));
        assert_eq!(session.exposure().state(ItemId(0)), ExposureState::None);
        assert_eq!(session.exposure().tracked_len(), session.realized().len());
    }

    #[test]
    fn shutdown_releases_player_and_later_calls_are_inert() {
        let mut session = session();
        session.start().unwrap();
        session.shutdown();

        assert!(session.coordinator().player().is_released());
        assert_eq!(session.set_scroll_state(ScrollState::Dragging).unwrap(), None);
        assert_eq!(session.set_scroll_state(ScrollState::Idle).unwrap(), None);
        assert_eq!(session.coordinator().player().release_count(), 1);
    }

    #[test]
    fn session_without_cache_starts_from_initial_page() {
        let session = session();
        assert_eq!(session.list().item_id_for_position(0), ItemId(0));
        assert_eq!(session.list().len(), 12);
    }

    #[test]
    fn cache_seeds_the_list_and_follows_data_changes() {
        let config = cached_config("seed");
        let cache = FeedCache::new(config.feed.cache_path.clone().unwrap());

        let mut session = FeedSession::new(&config, SimulatedPlayer::new());
        assert_eq!(cache.load().unwrap().len(), 12);

        session.start().unwrap();
        session.load_more();
        assert_eq!(cache.load().unwrap().len(), 18);
        session.refresh().unwrap();
        assert_eq!(cache.load().unwrap()[0].id, ItemId(500));

        let restored = FeedSession::new(&config, SimulatedPlayer::new());
        assert_eq!(restored.list().items(), session.list().items());

        cache.clear().unwrap();
    }

    #[test]
    fn corrupt_cache_falls_back_to_initial_page() {
        let config = cached_config("corrupt");
        let path = config.feed.cache_path.clone().unwrap();
        std::fs::write(&path, "not a feed").unwrap();

        let session = FeedSession::new(&config, SimulatedPlayer::new());
        assert_eq!(session.list().len(), 12);
        assert_eq!(session.list().item_id_for_position(0), ItemId(0));
        assert_eq!(FeedCache::new(&path).load().unwrap().len(), 12);

        FeedCache::new(path).clear().unwrap();
    }
}
