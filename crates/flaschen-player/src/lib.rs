//! Client facade and looping playback for Flaschen Taschen displays.

mod client;
mod player;
pub mod scheduler;

pub use client::FlaschenClient;
pub use player::Player;
pub use scheduler::{PlaybackScheduler, SchedulerState};
