//! World-level messages broadcast between systems.
use bevy::prelude::Message;

/// Fired once when the game clock wraps from day end back to the day start hour.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundaryEvent {
    pub day: u64,
}
