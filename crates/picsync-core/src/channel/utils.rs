//! Channel Utilities
//!
//! Type aliases and constructors for the controller's bounded channels.

use crate::channel::communication::{Command, SessionEvent};
use crate::config::ChannelConfig;
use std::fmt;

#[derive(Debug)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type EventSender = tokio::sync::mpsc::Sender<SessionEvent>;
pub type EventReceiver = tokio::sync::mpsc::Receiver<SessionEvent>;
pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded event channel (session layer → controller)
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(config.event_buffer_size)
}

/// Create bounded command channel (runtime handle → controller)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

// ----------------------------------------------------------------------------
// Non-blocking Send
// ----------------------------------------------------------------------------

/// Send without waiting for buffer space
pub trait NonBlockingSend<T> {
    fn send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl<T> NonBlockingSend<T> for tokio::sync::mpsc::Sender<T> {
    fn send_non_blocking(&self, message: T) -> Result<(), ChannelError> {
        self.try_send(message).map_err(|err| match err {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}
