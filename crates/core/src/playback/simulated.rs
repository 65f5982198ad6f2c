use serde::{Deserialize, Serialize};

use super::{MediaCapability, SinkId};
use crate::{FeedError, Result};

/// Operation recorded by [`SimulatedPlayer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerCall {
    Attach(SinkId),
    Detach,
    Load(String),
    Play,
    Pause,
    Release,
}

/// In-memory player that records every call it receives.
///
/// Used by the command line host in place of a real decoder and by tests to
/// assert ordering of attach/detach operations.
#[derive(Debug, Default, Clone)]
pub struct SimulatedPlayer {
    calls: Vec<PlayerCall>,
    attached: Option<SinkId>,
    media: Option<String>,
    playing: bool,
    released: bool,
    position_ms: u64,
    max_attached: usize,
    fail_pattern: Option<String>,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent load of a reference containing `pattern` fail.
    pub fn fail_loads_containing(&mut self, pattern: impl Into<String>) {
        self.fail_pattern = Some(pattern.into());
    }

    pub fn calls(&self) -> &[PlayerCall] {
        &self.calls
    }

    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn is_attached_to(&self, sink: SinkId) -> bool {
        self.attached == Some(sink)
    }

    /// Highest number of sinks ever attached at once.
    pub fn max_attached(&self) -> usize {
        self.max_attached
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn load_count(&self) -> usize {
        self.count(|call| matches!(call, PlayerCall::Load(_)))
    }

    pub fn release_count(&self) -> usize {
        self.count(|call| matches!(call, PlayerCall::Release))
    }

    /// Moves the playhead forward while playing.
    pub fn advance(&mut self, ms: u64) {
        if self.playing {
            self.position_ms += ms;
        }
    }

    fn count(&self, predicate: impl Fn(&PlayerCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(*call)).count()
    }
}

impl MediaCapability for SimulatedPlayer {
    fn attach(&mut self, sink: SinkId) {
        self.calls.push(PlayerCall::Attach(sink));
        // Attaching over a live sink would mean two sinks at once.
        let live = usize::from(self.attached.is_some()) + 1;
        self.max_attached = self.max_attached.max(live);
        self.attached = Some(sink);
    }

    fn detach(&mut self) {
        self.calls.push(PlayerCall::Detach);
        self.attached = None;
    }

    fn load(&mut self, media_ref: &str) -> Result<()> {
        self.calls.push(PlayerCall::Load(media_ref.to_string()));
        self.playing = false;
        self.position_ms = 0;

        if let Some(pattern) = &self.fail_pattern {
            if media_ref.contains(pattern.as_str()) {
                self.media = None;
                return Err(FeedError::msg(format!("cannot open {media_ref}")));
            }
        }
        self.media = Some(media_ref.to_string());
        Ok(())
    }

    fn play(&mut self) {
        self.calls.push(PlayerCall::Play);
        self.playing = self.media.is_some() && !self.released;
    }

    fn pause(&mut self) {
        self.calls.push(PlayerCall::Pause);
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn attached_sink(&self) -> Option<SinkId> {
        self.attached
    }

    fn release(&mut self) {
        self.calls.push(PlayerCall::Release);
        self.playing = false;
        self.attached = None;
        self.media = None;
        self.released = true;
    }
}
