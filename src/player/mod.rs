mod binding;
mod deck;
mod instance;
mod webview;

pub use binding::{BindingId, BindingSnapshot, BindingState, Playback, PlayerBinding, PlayerIntent};
pub use deck::{DeckSnapshot, PlayerDeck, PlayerEnvelope, ScriptStatus};
pub use instance::{
    describe_error, PlayerEvent, PlayerFactory, PlayerInstance, PlayerSpec, PlayerState,
    FATAL_ERROR_CODES,
};
pub use webview::{PlayerCommand, WebviewPlayer, WebviewPlayerFactory};

#[cfg(test)]
pub(crate) use instance::fake;
