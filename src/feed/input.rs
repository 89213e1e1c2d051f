use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::settings::ClientSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    Advance,
    Retreat,
}

/// Raw input forwarded by the feed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedInput {
    Key { key: String },
    Wheel { delta_y: f64 },
    TouchStart { y: f64 },
    TouchEnd { y: f64 },
}

pub fn key_navigation(key: &str) -> Option<Navigation> {
    match key {
        "ArrowDown" | "j" => Some(Navigation::Advance),
        "ArrowUp" | "k" => Some(Navigation::Retreat),
        _ => None,
    }
}

/// Turns a stream of wheel deltas into at most one step per cooldown. The
/// cooldown runs from the last accepted event; rejected events do not
/// extend it.
#[derive(Debug, Clone)]
pub struct WheelGate {
    threshold: f64,
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl WheelGate {
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, delta_y: f64, now: Instant) -> Option<Navigation> {
        if delta_y.abs() <= self.threshold {
            return None;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.cooldown {
                return None;
            }
        }
        self.last_accepted = Some(now);
        Some(if delta_y > 0.0 {
            Navigation::Advance
        } else {
            Navigation::Retreat
        })
    }
}

#[derive(Debug, Clone)]
pub struct TouchTracker {
    threshold: f64,
    start_y: Option<f64>,
}

impl TouchTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            start_y: None,
        }
    }

    pub fn start(&mut self, y: f64) {
        self.start_y = Some(y);
    }

    /// Swiping up (finger moving towards the top) advances.
    pub fn end(&mut self, y: f64) -> Option<Navigation> {
        let start = self.start_y.take()?;
        let delta = start - y;
        if delta > self.threshold {
            Some(Navigation::Advance)
        } else if delta < -self.threshold {
            Some(Navigation::Retreat)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputState {
    wheel: WheelGate,
    touch: TouchTracker,
}

impl InputState {
    pub fn new(settings: &ClientSettings) -> Self {
        Self {
            wheel: WheelGate::new(settings.wheel_threshold, settings.wheel_cooldown()),
            touch: TouchTracker::new(settings.swipe_threshold),
        }
    }

    pub fn translate(&mut self, input: &FeedInput, now: Instant) -> Option<Navigation> {
        match input {
            FeedInput::Key { key } => key_navigation(key),
            FeedInput::Wheel { delta_y } => self.wheel.accept(*delta_y, now),
            FeedInput::TouchStart { y } => {
                self.touch.start(*y);
                None
            }
            FeedInput::TouchEnd { y } => self.touch.end(*y),
        }
    }
}
