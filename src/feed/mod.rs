#[cfg(feature = "desktop")]
pub mod commands;
mod controller;
mod input;
mod source;

pub use controller::{FeedController, FeedSnapshot};
pub use input::{key_navigation, FeedInput, InputState, Navigation, TouchTracker, WheelGate};
pub use source::FeedSource;
