use once_cell::sync::OnceCell;
use uuid::Uuid;

static RUN_ID: OnceCell<String> = OnceCell::new();

/// Fresh identifier for one daemon run, prefixed to every log line.
pub fn new_run_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// First caller wins; returns false if a run id was already installed.
pub fn set_run_id(run_id: impl Into<String>) -> bool {
    RUN_ID.set(run_id.into()).is_ok()
}

pub fn run_id() -> Option<&'static str> {
    RUN_ID.get().map(String::as_str)
}

#[macro_export]
macro_rules! bridge_log {
    // Tests and embedders that never install a run id log unprefixed.
    ($level:expr, $($arg:tt)+) => {{
        if log::log_enabled!($level) {
            if let Some(id) = $crate::util::logging::run_id() {
                log::log!($level, "[{}] {}", id, format_args!($($arg)+));
            } else {
                log::log!($level, "{}", format_args!($($arg)+));
            }
        }
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::bridge_log!(log::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::bridge_log!(log::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::bridge_log!(log::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::bridge_log!(log::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::bridge_log!(log::Level::Trace, $($arg)+)
    };
}

pub use crate::{debug, error, info, trace, warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_simple_uuids() {
        let a = new_run_id();
        let b = new_run_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn first_run_id_sticks() {
        let first = new_run_id();
        if set_run_id(first.clone()) {
            assert_eq!(run_id(), Some(first.as_str()));
        }
        let before = run_id().map(str::to_owned);
        assert!(!set_run_id(new_run_id()));
        assert_eq!(run_id().map(str::to_owned), before);
    }
}
