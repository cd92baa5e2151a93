//! Channel types for controller communication

pub mod communication;
pub mod utils;

pub use communication::{Command, LookupError, LookupReplySender, SessionEvent};
pub use utils::{
    create_command_channel, create_event_channel, ChannelError, CommandReceiver, CommandSender,
    EventReceiver, EventSender, NonBlockingSend,
};
