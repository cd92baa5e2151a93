//! Notification sink interface

/// Best-effort sink for human-readable announcements
///
/// Implementations must not block: announcing happens from the controller
/// loop and from spawned tasks alike.
pub trait Announcer: Send + Sync {
    fn announce(&self, message: String);
}

/// Announce with `format!` syntax
#[macro_export]
macro_rules! announce {
    ($announcer:expr, $($arg:tt)*) => {
        $announcer.announce(format!($($arg)*))
    };
}
