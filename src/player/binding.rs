use serde::Serialize;

use super::instance::{
    describe_error, PlayerEvent, PlayerFactory, PlayerInstance, PlayerSpec, PlayerState,
    FATAL_ERROR_CODES,
};
use crate::models::Segment;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub type BindingId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Playback {
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum BindingState {
    Uninitialized,
    Ready(Playback),
    Failed(String),
    Destroyed,
}

/// Something the binding wants the feed controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerIntent {
    ToggleMute,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingSnapshot {
    pub id: BindingId,
    pub slot: usize,
    pub segment_id: String,
    pub element_id: String,
    pub state: BindingState,
    pub active: bool,
    /// Shown instead of the player until it is ready, and for good once it
    /// has failed.
    pub placeholder_url: String,
}

/// One mounted feed card and its player. Owns at most one instance and keeps
/// it in line with the active flag and the shared mute flag.
pub struct PlayerBinding {
    id: BindingId,
    slot: usize,
    segment_id: String,
    spec: PlayerSpec,
    placeholder_url: String,
    state: BindingState,
    active: bool,
    muted: bool,
    instance: Option<Box<dyn PlayerInstance>>,
}

impl PlayerBinding {
    pub fn new(id: BindingId, slot: usize, segment: &Segment, muted: bool) -> Self {
        Self {
            id,
            slot,
            segment_id: segment.id.clone(),
            spec: PlayerSpec {
                element_id: format!("player-{id}"),
                video_id: segment.youtube_id().to_string(),
                start: segment.start_time,
                end: segment.end_time,
            },
            placeholder_url: segment.thumbnail_url(),
            state: BindingState::Uninitialized,
            active: false,
            muted,
            instance: None,
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    pub fn spec(&self) -> &PlayerSpec {
        &self.spec
    }

    pub fn state(&self) -> &BindingState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, BindingState::Ready(_))
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, BindingState::Failed(_) | BindingState::Destroyed)
    }

    /// Builds the underlying instance once the player script is available.
    /// Readiness still has to come through [`PlayerEvent::Ready`].
    pub fn attach(&mut self, factory: &dyn PlayerFactory) {
        if self.is_terminal() || self.instance.is_some() {
            return;
        }
        match factory.create(&self.spec) {
            Ok(instance) => self.instance = Some(instance),
            Err(err) => self.fail(format!("player unavailable: {err}")),
        }
    }

    pub fn set_slot(&mut self, slot: usize) {
        self.slot = slot;
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if self.is_ready() {
            self.apply_activity();
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        if self.active && self.is_ready() {
            self.apply_mute();
        }
    }

    pub fn handle(&mut self, event: PlayerEvent) -> Option<PlayerIntent> {
        if self.is_terminal() {
            log_debug!("Binding {} ignoring {event:?} in {:?}", self.id, self.state);
            return None;
        }

        match event {
            PlayerEvent::Ready => self.on_ready(),
            PlayerEvent::StateChange(state) => self.on_state_change(state),
            PlayerEvent::Error(code) => self.on_error(code),
            PlayerEvent::Progress(seconds) => self.check_position(seconds),
            PlayerEvent::MuteToggle => return Some(PlayerIntent::ToggleMute),
        }
        None
    }

    /// Polls the instance position for players that overrun the end offset.
    pub fn tick(&mut self) {
        if !self.active || self.state != BindingState::Ready(Playback::Playing) {
            return;
        }
        if let Some(seconds) = self.instance.as_ref().and_then(|p| p.current_time()) {
            self.check_position(seconds);
        }
    }

    /// Script failure or an unplayable video. The card falls back to its
    /// thumbnail for the rest of its life.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let reason = reason.into();
        log_warn!("Player for segment {} failed: {reason}", self.segment_id);
        if let Some(mut instance) = self.instance.take() {
            instance.destroy();
        }
        self.state = BindingState::Failed(reason);
    }

    pub fn destroy(&mut self) {
        if self.state == BindingState::Destroyed {
            return;
        }
        if let Some(mut instance) = self.instance.take() {
            instance.destroy();
        }
        self.state = BindingState::Destroyed;
    }

    pub fn snapshot(&self) -> BindingSnapshot {
        BindingSnapshot {
            id: self.id,
            slot: self.slot,
            segment_id: self.segment_id.clone(),
            element_id: self.spec.element_id.clone(),
            state: self.state.clone(),
            active: self.active,
            placeholder_url: self.placeholder_url.clone(),
        }
    }

    fn on_ready(&mut self) {
        if self.state != BindingState::Uninitialized {
            return;
        }
        if self.instance.is_none() {
            log_warn!("Binding {} got ready before it had an instance", self.id);
            return;
        }
        self.state = BindingState::Ready(Playback::Paused);
        self.apply_mute();
        if self.active {
            self.restart();
        }
    }

    fn on_state_change(&mut self, state: PlayerState) {
        let BindingState::Ready(_) = self.state else {
            return;
        };
        match state {
            PlayerState::Ended if self.active => self.restart(),
            PlayerState::Ended => self.state = BindingState::Ready(Playback::Paused),
            PlayerState::Playing => self.state = BindingState::Ready(Playback::Playing),
            PlayerState::Paused => self.state = BindingState::Ready(Playback::Paused),
            PlayerState::Unstarted | PlayerState::Buffering | PlayerState::Cued => {}
        }
    }

    fn on_error(&mut self, code: i32) {
        if FATAL_ERROR_CODES.contains(&code) {
            self.fail(format!("{} (code {code})", describe_error(code)));
        } else {
            log_warn!("Ignoring player error {code} for segment {}", self.segment_id);
        }
    }

    fn check_position(&mut self, seconds: f64) {
        if self.active && self.is_ready() && seconds >= self.spec.end {
            self.restart();
        }
    }

    fn apply_activity(&mut self) {
        if self.active {
            self.apply_mute();
            self.restart();
        } else if let Some(instance) = self.instance.as_mut() {
            instance.pause();
            self.state = BindingState::Ready(Playback::Paused);
        }
    }

    fn apply_mute(&mut self) {
        let muted = self.muted;
        if let Some(instance) = self.instance.as_mut() {
            if muted {
                instance.mute();
            } else {
                instance.unmute();
            }
        }
    }

    fn restart(&mut self) {
        let start = self.spec.start;
        if let Some(instance) = self.instance.as_mut() {
            instance.seek_to(start);
            instance.play();
            self.state = BindingState::Ready(Playback::Playing);
        }
    }
}

impl Drop for PlayerBinding {
    fn drop(&mut self) {
        self.destroy();
    }
}
