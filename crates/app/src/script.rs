use std::str::FromStr;

use feed_exposure_core::FeedError;

/// Script used when `simulate` runs without `--script`.
pub const DEFAULT_SCRIPT: &str =
    "drag:400, idle, tap:5, tap:5, drag:900, fling:1200, idle, more, drag:600, idle, pause";

/// One host action in a simulation script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Finger-driven scroll by the given distance.
    Drag(f32),
    /// Momentum scroll by the given distance.
    Fling(f32),
    Idle,
    Tap(usize),
    Pause,
    More,
    Refresh,
    Remove(usize),
}

impl FromStr for Step {
    type Err = FeedError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (name, arg) = match raw.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (raw, None),
        };

        let distance = |arg: Option<&str>| -> Result<f32, FeedError> {
            arg.and_then(|value| value.parse::<f32>().ok())
                .filter(|value| value.is_finite())
                .ok_or_else(|| FeedError::msg(format!("`{raw}` needs a pixel distance")))
        };
        let position = |arg: Option<&str>| -> Result<usize, FeedError> {
            arg.and_then(|value| value.parse::<usize>().ok())
                .ok_or_else(|| FeedError::msg(format!("`{raw}` needs a card position")))
        };

        match name {
            "drag" => Ok(Step::Drag(distance(arg)?)),
            "fling" => Ok(Step::Fling(distance(arg)?)),
            "idle" => Ok(Step::Idle),
            "tap" => Ok(Step::Tap(position(arg)?)),
            "pause" => Ok(Step::Pause),
            "more" => Ok(Step::More),
            "refresh" => Ok(Step::Refresh),
            "remove" => Ok(Step::Remove(position(arg)?)),
            _ => Err(FeedError::msg(format!("unknown script step `{raw}`"))),
        }
    }
}

/// Parses a comma or whitespace separated list of steps.
pub fn parse(script: &str) -> Result<Vec<Step>, FeedError> {
    script
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}
