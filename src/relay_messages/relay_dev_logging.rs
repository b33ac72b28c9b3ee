// RELAY EVENT LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_events")]
macro_rules! event_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_events"))]
macro_rules! event_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// Target command timers
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        saying::say!($msg, Green #$time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        // Nothing
    };
}
