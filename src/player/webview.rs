use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::instance::{PlayerFactory, PlayerInstance, PlayerSpec};
use crate::events::{emit, EventSink, PLAYER_COMMAND};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    Create {
        element_id: String,
        video_id: String,
        start: f64,
        end: f64,
    },
    Play { element_id: String },
    Pause { element_id: String },
    Seek { element_id: String, seconds: f64 },
    Mute { element_id: String },
    Unmute { element_id: String },
    Destroy { element_id: String },
}

/// Player living in the webview. Each method becomes a `player-command`
/// event; the page drives the real IFrame player and reports back through
/// the player event command.
pub struct WebviewPlayer {
    element_id: String,
    sink: Arc<dyn EventSink>,
}

impl WebviewPlayer {
    fn send(&self, command: PlayerCommand) {
        emit(self.sink.as_ref(), PLAYER_COMMAND, &command);
    }

    fn id(&self) -> String {
        self.element_id.clone()
    }
}

impl PlayerInstance for WebviewPlayer {
    fn play(&mut self) {
        self.send(PlayerCommand::Play { element_id: self.id() });
    }

    fn pause(&mut self) {
        self.send(PlayerCommand::Pause { element_id: self.id() });
    }

    fn seek_to(&mut self, seconds: f64) {
        self.send(PlayerCommand::Seek {
            element_id: self.id(),
            seconds,
        });
    }

    fn mute(&mut self) {
        self.send(PlayerCommand::Mute { element_id: self.id() });
    }

    fn unmute(&mut self) {
        self.send(PlayerCommand::Unmute { element_id: self.id() });
    }

    fn destroy(&mut self) {
        self.send(PlayerCommand::Destroy { element_id: self.id() });
    }

    fn current_time(&self) -> Option<f64> {
        None
    }
}

#[derive(Clone)]
pub struct WebviewPlayerFactory {
    sink: Arc<dyn EventSink>,
}

impl WebviewPlayerFactory {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

impl PlayerFactory for WebviewPlayerFactory {
    fn create(&self, spec: &PlayerSpec) -> Result<Box<dyn PlayerInstance>> {
        let player = WebviewPlayer {
            element_id: spec.element_id.clone(),
            sink: self.sink.clone(),
        };
        player.send(PlayerCommand::Create {
            element_id: spec.element_id.clone(),
            video_id: spec.video_id.clone(),
            start: spec.start,
            end: spec.end,
        });
        Ok(Box::new(player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use serde_json::json;

    #[test]
    fn calls_become_player_commands() {
        let sink = RecordingSink::default();
        let factory = WebviewPlayerFactory::new(Arc::new(sink.clone()));
        let mut player = factory
            .create(&PlayerSpec {
                element_id: "player-7".into(),
                video_id: "abc".into(),
                start: 10.0,
                end: 40.0,
            })
            .unwrap();
        player.seek_to(10.0);
        player.destroy();

        assert_eq!(
            sink.named(PLAYER_COMMAND),
            vec![
                json!({"command": "create", "element_id": "player-7", "video_id": "abc",
                       "start": 10.0, "end": 40.0}),
                json!({"command": "seek", "element_id": "player-7", "seconds": 10.0}),
                json!({"command": "destroy", "element_id": "player-7"}),
            ]
        );
    }
}
