//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! A module opts in by declaring the flag and importing the macros from the
//! crate root:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//!
//! log_info!("frame loop started");
//! ```
//! With the flag set to `false` the calls compile away, which keeps the frame
//! loop quiet without touching `RUST_LOG`.

use log::LevelFilter;

/// Forwards to `log::log!` at the given level when `ENABLE_LOGS` is true in
/// the calling module.
#[macro_export]
macro_rules! gated_log {
    ($level:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::log!($level, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::gated_log!(log::Level::Debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::gated_log!(log::Level::Info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::gated_log!(log::Level::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::gated_log!(log::Level::Error, $($arg)*) };
}

/// Default level when `RUST_LOG` is unset. `HANDTIME_DEBUG=1` (or `true`)
/// turns on debug output.
pub fn default_level() -> LevelFilter {
    let debug_mode = std::env::var("HANDTIME_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if debug_mode {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs `env_logger`, reading `RUST_LOG` on top of the default level.
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::new()
        .filter_level(default_level())
        .parse_default_env()
        .try_init();
}

#[cfg(test)]
mod tests {
    const ENABLE_LOGS: bool = false;

    #[test]
    fn disabled_macros_do_not_evaluate_arguments() {
        let mut evaluated = false;
        crate::log_info!("{}", {
            evaluated = true;
            "never"
        });
        assert!(!evaluated);
    }

    #[test]
    fn init_twice_is_harmless() {
        super::init();
        super::init();
    }
}
