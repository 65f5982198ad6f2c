//! Simulated vertical list layout.
//!
//! Stands in for the rendering surface: places cards top to bottom, tracks
//! the scroll offset and reports geometry of the realized slots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FeedConfig, FeedSource, ItemId, SinkId, ViewportConfig, VisibleGeometry};

/// Geometry of one realized slot, relative to the viewport top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotGeometry {
    pub position: usize,
    pub top: f32,
    pub bottom: f32,
    pub height: f32,
}

impl SlotGeometry {
    /// Vertical center in viewport coordinates.
    pub fn center(&self) -> f32 {
        (self.top + self.bottom) * 0.5
    }

    /// Resolves the slot's item through `source`; `None` for non-data slots.
    pub fn to_visible(&self, source: &impl FeedSource) -> Option<VisibleGeometry> {
        let item_id = source.item_id_for_position(self.position);
        item_id
            .is_valid()
            .then(|| VisibleGeometry::new(item_id, self.top, self.bottom, self.height))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinearLayout {
    /// Top edge of each card in content coordinates, plus the content end.
    edges: Vec<f32>,
    offset: f32,
}

impl LinearLayout {
    pub fn new(heights: impl IntoIterator<Item = f32>) -> Self {
        let mut layout = Self::default();
        layout.set_heights(heights);
        layout
    }

    /// Lays the feed out using the nominal height of each card kind.
    pub fn for_source<S: FeedSource>(source: &S, config: &FeedConfig) -> Self {
        Self::new(Self::heights_of(source, config))
    }

    pub fn heights_of<'a, S: FeedSource>(
        source: &'a S,
        config: &'a FeedConfig,
    ) -> impl Iterator<Item = f32> + 'a {
        (0..source.len()).map(move |position| {
            source
                .item_at(position)
                .map(|item| config.height_for(item.kind))
                .unwrap_or(0.0)
        })
    }

    /// Replaces card heights, keeping the scroll offset where possible.
    /// Negative or non-finite heights are laid out as zero.
    pub fn set_heights(&mut self, heights: impl IntoIterator<Item = f32>) {
        self.edges.clear();
        let mut cursor = 0.0_f32;
        self.edges.push(cursor);
        for height in heights {
            let height = if height.is_finite() { height.max(0.0) } else { 0.0 };
            cursor += height;
            self.edges.push(cursor);
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_height(&self) -> f32 {
        self.edges.last().copied().unwrap_or(0.0)
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Largest offset that still keeps the viewport filled.
    pub fn max_offset(&self, viewport_height: f32) -> f32 {
        (self.content_height() - viewport_height).max(0.0)
    }

    /// Scrolls by `dy` pixels (positive moves content up) and returns the
    /// distance actually travelled after clamping to the content bounds.
    pub fn scroll_by(&mut self, dy: f32, viewport_height: f32) -> f32 {
        if !dy.is_finite() {
            return 0.0;
        }
        let before = self.offset;
        self.offset = (self.offset + dy).clamp(0.0, self.max_offset(viewport_height));
        self.offset - before
    }

    pub fn scroll_to(&mut self, offset: f32, viewport_height: f32) {
        self.offset = 0.0;
        self.scroll_by(offset, viewport_height);
    }

    /// Slots intersecting the viewport plus `overscan` cards on either side,
    /// in ascending position order.
    pub fn realized_slots(&self, viewport: &ViewportConfig) -> Vec<SlotGeometry> {
        let count = self.len();
        if count == 0 {
            return Vec::new();
        }

        let view_top = self.offset;
        let view_bottom = self.offset + viewport.height.max(0.0);
        // First card whose bottom edge lies below the viewport top.
        let first = self.edges[1..].partition_point(|&bottom| bottom <= view_top);
        // First card whose top edge lies at or below the viewport bottom.
        let end = self.edges[..count].partition_point(|&top| top < view_bottom);

        let start = first.min(end).saturating_sub(viewport.overscan);
        let end = (end.max(first) + viewport.overscan).min(count);

        (start..end)
            .map(|position| {
                let top = self.edges[position] - self.offset;
                let bottom = self.edges[position + 1] - self.offset;
                SlotGeometry {
                    position,
                    top,
                    bottom,
                    height: bottom - top,
                }
            })
            .collect()
    }
}

/// Hands out visual sinks to realized items and reclaims them once the
/// item leaves the realized set.
#[derive(Debug, Default)]
pub struct SinkPool {
    assigned: BTreeMap<ItemId, SinkId>,
    free: Vec<SinkId>,
    next: u32,
}

impl SinkPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink_for(&self, item_id: ItemId) -> Option<SinkId> {
        self.assigned.get(&item_id).copied()
    }

    pub fn assigned_len(&self) -> usize {
        self.assigned.len()
    }

    /// Matches sink assignments to `realized` and returns the sinks that
    /// were reclaimed, before any of them is handed to a new item.
    pub fn sync(&mut self, realized: &[ItemId]) -> Vec<SinkId> {
        let mut recycled = Vec::new();
        self.assigned.retain(|item_id, sink| {
            let keep = realized.contains(item_id);
            if !keep {
                recycled.push(*sink);
            }
            keep
        });
        // Reclaimed sinks are handed out again in reclaim order.
        self.free.extend(recycled.iter().rev().copied());

        for &item_id in realized {
            if !item_id.is_valid() || self.assigned.contains_key(&item_id) {
                continue;
            }
            let sink = match self.free.pop() {
                Some(sink) => sink,
                None => {
                    let sink = SinkId(self.next);
                    self.next += 1;
                    sink
                }
            };
            self.assigned.insert(item_id, sink);
        }

        recycled
    }
}
