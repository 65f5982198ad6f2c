//! Per-item viewport exposure tracking.
//!
//! [`ExposureEngine`] is a pure state machine: every call to
//! [`ExposureEngine::tick`] classifies one geometry snapshot and emits the
//! discrete events that represent forward transitions since the previous
//! tick. It knows nothing about playback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ItemId;

/// Ratio at or above which an item counts as half visible.
pub const HALF_VISIBLE_THRESHOLD: f32 = 0.5;
/// Ratio at or above which an item counts as fully visible. Slightly below
/// one so sub-pixel rounding at the viewport edge still qualifies.
pub const FULLY_VISIBLE_THRESHOLD: f32 = 0.99;

/// How much of an item is currently inside the viewport.
///
/// Variants are ordered so thresholds can be compared directly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExposureState {
    #[default]
    None,
    Entered,
    HalfVisible,
    FullyVisible,
}

impl ExposureState {
    /// Maps a visible ratio onto its classification.
    pub fn classify(ratio: f32) -> Self {
        if ratio.is_nan() || ratio <= 0.0 {
            ExposureState::None
        } else if ratio >= FULLY_VISIBLE_THRESHOLD {
            ExposureState::FullyVisible
        } else if ratio >= HALF_VISIBLE_THRESHOLD {
            ExposureState::HalfVisible
        } else {
            ExposureState::Entered
        }
    }
}

/// Discrete transition reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureEventKind {
    Enter,
    OverHalf,
    FullyVisible,
    Disappear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureEvent {
    pub item_id: ItemId,
    pub kind: ExposureEventKind,
    /// Visible ratio in `[0, 1]` at the moment of the transition.
    pub visible_ratio: f32,
}

impl ExposureEvent {
    pub fn new(item_id: ItemId, kind: ExposureEventKind, visible_ratio: f32) -> Self {
        Self {
            item_id,
            kind,
            visible_ratio,
        }
    }
}

/// Geometry of one realized slot, in the viewport's own pixel space.
/// Recomputed every scroll tick and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleGeometry {
    pub item_id: ItemId,
    pub top: f32,
    pub bottom: f32,
    pub height: f32,
}

impl VisibleGeometry {
    pub fn new(item_id: ItemId, top: f32, bottom: f32, height: f32) -> Self {
        Self {
            item_id,
            top,
            bottom,
            height,
        }
    }

    /// Fraction of this slot's height inside `[0, viewport_height]`.
    ///
    /// Malformed geometry (non-positive or non-finite height, NaN edges)
    /// yields `0.0`.
    pub fn visible_ratio(&self, viewport_height: f32) -> f32 {
        if !self.height.is_finite() || self.height <= 0.0 {
            return 0.0;
        }
        let viewport_height = if viewport_height.is_finite() {
            viewport_height.max(0.0)
        } else {
            0.0
        };

        let visible = self.bottom.min(viewport_height) - self.top.max(0.0);
        let ratio = visible.clamp(0.0, self.height) / self.height;
        if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        }
    }
}

/// Tracks exposure state per item across scroll ticks.
#[derive(Debug, Default, Clone)]
pub struct ExposureEngine {
    states: BTreeMap<ItemId, ExposureState>,
}

impl ExposureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored state for `item_id`, `None` if never seen.
    pub fn state(&self, item_id: ItemId) -> ExposureState {
        self.states.get(&item_id).copied().unwrap_or_default()
    }

    /// Number of items the engine currently remembers.
    pub fn tracked_len(&self) -> usize {
        self.states.len()
    }

    /// Drops bookkeeping for an item permanently removed from the feed.
    pub fn forget(&mut self, item_id: ItemId) {
        self.states.remove(&item_id);
    }

    /// Keeps bookkeeping only for items matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(ItemId) -> bool) {
        self.states.retain(|id, _| keep(*id));
    }

    /// Clears all bookkeeping without emitting events.
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Classifies `snapshot` and returns the events it triggers, in slot
    /// order followed by disappearances of items absent from the snapshot.
    pub fn tick(&mut self, snapshot: &[VisibleGeometry], viewport_height: f32) -> Vec<ExposureEvent> {
        let mut events = Vec::new();
        self.tick_with(snapshot, viewport_height, |event| events.push(*event));
        events
    }

    /// Same as [`tick`](Self::tick) but delivers each event to `on_event`
    /// synchronously, one invocation per event.
    pub fn tick_with(
        &mut self,
        snapshot: &[VisibleGeometry],
        viewport_height: f32,
        mut on_event: impl FnMut(&ExposureEvent),
    ) {
        let mut next_states = BTreeMap::new();
        let mut emit = |event: ExposureEvent| {
            tracing::debug!(
                item_id = %event.item_id,
                kind = ?event.kind,
                ratio = event.visible_ratio,
                "exposure event"
            );
            on_event(&event);
        };

        for geometry in snapshot {
            let id = geometry.item_id;
            // A repeated id within one snapshot transitions from its latest state.
            let prev = next_states
                .get(&id)
                .or_else(|| self.states.get(&id))
                .copied()
                .unwrap_or_default();
            let ratio = geometry.visible_ratio(viewport_height);
            let next = ExposureState::classify(ratio);

            for kind in transitions(prev, next) {
                let ratio = if kind == ExposureEventKind::Disappear { 0.0 } else { ratio };
                emit(ExposureEvent::new(id, kind, ratio));
            }
            next_states.insert(id, next);
        }

        for (&id, &prev) in &self.states {
            if next_states.contains_key(&id) {
                continue;
            }
            if prev != ExposureState::None {
                emit(ExposureEvent::new(id, ExposureEventKind::Disappear, 0.0));
            }
            next_states.insert(id, ExposureState::None);
        }

        self.states = next_states;
    }
}

/// Events fired by moving from `prev` to `next`, in emission order.
/// Each rule is checked independently against the same pair.
fn transitions(prev: ExposureState, next: ExposureState) -> impl Iterator<Item = ExposureEventKind> {
    use ExposureState as S;

    let enter = prev == S::None && next != S::None;
    let over_half = prev < S::HalfVisible && next >= S::HalfVisible;
    let fully = prev < S::FullyVisible && next == S::FullyVisible;
    let disappear = prev != S::None && next == S::None;

    [
        (enter, ExposureEventKind::Enter),
        (over_half, ExposureEventKind::OverHalf),
        (fully, ExposureEventKind::FullyVisible),
        (disappear, ExposureEventKind::Disappear),
    ]
    .into_iter()
    .filter_map(|(fired, kind)| fired.then_some(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEIGHT: f32 = 100.0;
    const VIEWPORT: f32 = 1000.0;

    /// Slot of height 100 poking `ratio` of itself out from the top edge.
    fn at_ratio(id: i64, ratio: f32) -> VisibleGeometry {
        let bottom = ratio * HEIGHT;
        VisibleGeometry::new(ItemId(id), bottom - HEIGHT, bottom, HEIGHT)
    }

    fn kinds(events: &[ExposureEvent]) -> Vec<ExposureEventKind> {
        events.iter().map(|event| event.kind).collect()
    }

    #[test]
    fn classifies_threshold_boundaries() {
        assert_eq!(ExposureState::classify(0.0), ExposureState::None);
        assert_eq!(ExposureState::classify(0.01), ExposureState::Entered);
        assert_eq!(ExposureState::classify(0.5), ExposureState::HalfVisible);
        assert_eq!(ExposureState::classify(0.989), ExposureState::HalfVisible);
        assert_eq!(ExposureState::classify(0.99), ExposureState::FullyVisible);
        assert_eq!(ExposureState::classify(f32::NAN), ExposureState::None);
    }

    #[test]
    fn malformed_geometry_degrades_to_zero_ratio() {
        let zero = VisibleGeometry::new(ItemId(1), 0.0, 0.0, 0.0);
        let negative = VisibleGeometry::new(ItemId(1), 0.0, 50.0, -50.0);
        let nan = VisibleGeometry::new(ItemId(1), f32::NAN, 50.0, 50.0);
        let nan_height = VisibleGeometry::new(ItemId(1), 0.0, 50.0, f32::NAN);

        assert_eq!(zero.visible_ratio(VIEWPORT), 0.0);
        assert_eq!(negative.visible_ratio(VIEWPORT), 0.0);
        assert!((0.0..=1.0).contains(&nan.visible_ratio(VIEWPORT)));
        assert_eq!(nan_height.visible_ratio(VIEWPORT), 0.0);
        assert_eq!(at_ratio(1, 1.0).visible_ratio(f32::NAN), 0.0);
    }

    #[test]
    fn ratio_is_clipped_by_both_viewport_edges() {
        let tall = VisibleGeometry::new(ItemId(1), -100.0, 300.0, 400.0);
        assert!((tall.visible_ratio(200.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn increasing_ratio_emits_each_upward_event_once_in_order() {
        let mut engine = ExposureEngine::new();
        let mut all = Vec::new();
        for ratio in [0.0, 0.3, 0.6, 1.0] {
            all.extend(engine.tick(&[at_ratio(7, ratio)], VIEWPORT));
        }

        assert_eq!(
            kinds(&all),
            vec![
                ExposureEventKind::Enter,
                ExposureEventKind::OverHalf,
                ExposureEventKind::FullyVisible
            ]
        );
        assert!(all.iter().all(|event| event.item_id == ItemId(7)));
        assert!((all[0].visible_ratio - 0.3).abs() < 1e-6);
    }

    #[test]
    fn dropping_below_half_while_visible_emits_nothing() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(1, 0.6)], VIEWPORT);

        let events = engine.tick(&[at_ratio(1, 0.3)], VIEWPORT);
        assert!(events.is_empty());
        assert_eq!(engine.state(ItemId(1)), ExposureState::Entered);
    }

    #[test]
    fn shrinking_to_zero_emits_disappear_with_zero_ratio() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(1, 0.6)], VIEWPORT);

        let events = engine.tick(&[at_ratio(1, 0.0)], VIEWPORT);
        assert_eq!(events, vec![ExposureEvent::new(ItemId(1), ExposureEventKind::Disappear, 0.0)]);
    }

    #[test]
    fn item_missing_from_snapshot_disappears() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(1, 0.7), at_ratio(2, 1.0)], VIEWPORT);

        let events = engine.tick(&[at_ratio(2, 1.0)], VIEWPORT);
        assert_eq!(events, vec![ExposureEvent::new(ItemId(1), ExposureEventKind::Disappear, 0.0)]);
        assert_eq!(engine.state(ItemId(1)), ExposureState::None);

        // Already gone: no second disappear.
        assert!(engine.tick(&[at_ratio(2, 1.0)], VIEWPORT).is_empty());
    }

    #[test]
    fn half_visible_from_none_fires_enter_and_over_half_together() {
        let mut engine = ExposureEngine::new();
        let geometry = VisibleGeometry::new(ItemId(1), -50.0, 50.0, 100.0);

        let events = engine.tick(&[geometry], 200.0);
        assert_eq!(
            kinds(&events),
            vec![ExposureEventKind::Enter, ExposureEventKind::OverHalf]
        );
        assert!(events.iter().all(|event| (event.visible_ratio - 0.5).abs() < 1e-6));
    }

    #[test]
    fn jumping_straight_to_fully_visible_fires_all_three() {
        let mut engine = ExposureEngine::new();
        let events = engine.tick(&[at_ratio(1, 1.0)], VIEWPORT);
        assert_eq!(
            kinds(&events),
            vec![
                ExposureEventKind::Enter,
                ExposureEventKind::OverHalf,
                ExposureEventKind::FullyVisible
            ]
        );
    }

    #[test]
    fn unchanged_classification_is_silent() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(1, 0.2)], VIEWPORT);
        assert!(engine.tick(&[at_ratio(1, 0.25)], VIEWPORT).is_empty());
    }

    #[test]
    fn reentry_starts_a_new_episode() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(1, 1.0)], VIEWPORT);
        engine.tick(&[], VIEWPORT);

        let events = engine.tick(&[at_ratio(1, 0.6)], VIEWPORT);
        assert_eq!(
            kinds(&events),
            vec![ExposureEventKind::Enter, ExposureEventKind::OverHalf]
        );
    }

    #[test]
    fn events_follow_slot_order_then_disappearances() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(9, 0.3)], VIEWPORT);

        let events = engine.tick(&[at_ratio(5, 0.3), at_ratio(3, 0.3)], VIEWPORT);
        let ids: Vec<_> = events.iter().map(|event| (event.item_id, event.kind)).collect();
        assert_eq!(
            ids,
            vec![
                (ItemId(5), ExposureEventKind::Enter),
                (ItemId(3), ExposureEventKind::Enter),
                (ItemId(9), ExposureEventKind::Disappear),
            ]
        );
    }

    #[test]
    fn callback_receives_one_invocation_per_event() {
        let mut engine = ExposureEngine::new();
        let mut seen = Vec::new();
        engine.tick_with(&[at_ratio(1, 1.0)], VIEWPORT, |event| seen.push(event.kind));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn forget_drops_bookkeeping_silently() {
        let mut engine = ExposureEngine::new();
        engine.tick(&[at_ratio(1, 1.0), at_ratio(2, 1.0)], VIEWPORT);
        engine.forget(ItemId(1));

        let events = engine.tick(&[at_ratio(2, 1.0)], VIEWPORT);
        assert!(events.is_empty());
        assert_eq!(engine.tracked_len(), 1);
    }

    #[test]
    fn events_serialize_with_snake_case_kind() {
        let event = ExposureEvent::new(ItemId(12), ExposureEventKind::OverHalf, 0.5);
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "item_id": 12, "kind": "over_half", "visible_ratio": 0.5 })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn ratios_stay_in_unit_interval(
            top in -5000.0f32..5000.0,
            extent in -500.0f32..2000.0,
            viewport in -10.0f32..3000.0,
        ) {
            let geometry = VisibleGeometry::new(ItemId(1), top, top + extent, extent);
            let ratio = geometry.visible_ratio(viewport);
            prop_assert!((0.0..=1.0).contains(&ratio));
        }

        #[test]
        fn each_upward_event_fires_at_most_once_per_episode(
            ratios in proptest::collection::vec(0.0f32..=1.0, 1..40),
        ) {
            let mut engine = ExposureEngine::new();
            let mut fired: Vec<ExposureEventKind> = Vec::new();

            for ratio in ratios {
                for event in engine.tick(&[at_ratio(1, ratio)], VIEWPORT) {
                    prop_assert!((0.0..=1.0).contains(&event.visible_ratio));
                    if event.kind == ExposureEventKind::Disappear {
                        prop_assert!(fired.contains(&ExposureEventKind::Enter));
                        prop_assert_eq!(event.visible_ratio, 0.0);
                        fired.clear();
                    } else {
                        prop_assert!(!fired.contains(&event.kind));
                        if event.kind != ExposureEventKind::Enter {
                            prop_assert!(fired.contains(&ExposureEventKind::Enter));
                        }
                        fired.push(event.kind);
                    }
                }
            }
        }
    }
}
