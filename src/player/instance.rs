use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Numeric player states reported by the embedded YouTube player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    pub fn code(self) -> i32 {
        match self {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::Cued => 5,
        }
    }
}

impl TryFrom<i32> for PlayerState {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(PlayerState::Unstarted),
            0 => Ok(PlayerState::Ended),
            1 => Ok(PlayerState::Playing),
            2 => Ok(PlayerState::Paused),
            3 => Ok(PlayerState::Buffering),
            5 => Ok(PlayerState::Cued),
            other => Err(format!("unknown player state {other}")),
        }
    }
}

impl From<PlayerState> for i32 {
    fn from(state: PlayerState) -> Self {
        state.code()
    }
}

/// Error codes that mean the video itself cannot be played here (bad id,
/// HTML5 failure, removed, embedding disabled).
pub const FATAL_ERROR_CODES: [i32; 5] = [2, 5, 100, 101, 150];

pub fn describe_error(code: i32) -> &'static str {
    match code {
        2 => "invalid video id",
        5 => "video cannot be played in this player",
        100 => "video not found",
        101 | 150 => "embedding disabled by the owner",
        _ => "player error",
    }
}

/// Callbacks from a player instance, as forwarded by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlayerEvent {
    Ready,
    StateChange(PlayerState),
    Error(i32),
    /// Position pushed by players that report it rather than being polled.
    Progress(f64),
    /// The user pressed the mute control on this card.
    MuteToggle,
}

/// Everything a factory needs to build one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSpec {
    pub element_id: String,
    pub video_id: String,
    pub start: f64,
    pub end: f64,
}

pub trait PlayerInstance: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, seconds: f64);
    fn mute(&mut self);
    fn unmute(&mut self);
    fn destroy(&mut self);
    /// `None` when the position is only known through `Progress` events.
    fn current_time(&self) -> Option<f64>;
}

pub trait PlayerFactory: Send + Sync {
    fn create(&self, spec: &PlayerSpec) -> Result<Box<dyn PlayerInstance>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_match_the_player_constants() {
        for state in [
            PlayerState::Unstarted,
            PlayerState::Ended,
            PlayerState::Playing,
            PlayerState::Paused,
            PlayerState::Buffering,
            PlayerState::Cued,
        ] {
            assert_eq!(PlayerState::try_from(state.code()), Ok(state));
        }
        assert!(PlayerState::try_from(4).is_err());
    }

    #[test]
    fn events_decode_from_front_end_payloads() {
        let event: PlayerEvent =
            serde_json::from_str(r#"{"kind": "state_change", "value": 0}"#).unwrap();
        assert_eq!(event, PlayerEvent::StateChange(PlayerState::Ended));
        let event: PlayerEvent = serde_json::from_str(r#"{"kind": "ready"}"#).unwrap();
        assert_eq!(event, PlayerEvent::Ready);
    }
}
