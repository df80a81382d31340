//! Structured logging utilities for repoindex components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use repoindex_config::log_tree_debug;
//!
//! log_tree_debug!("Link created", dest = %path.display());
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const CONFIG: &'static str = "CONFIG";
    pub const CLI: &'static str = "CLI";
    pub const VFS: &'static str = "VFS";
    pub const STORE: &'static str = "STORE";
    pub const TREE: &'static str = "TREE";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Map a `-v` count to a level, starting from `Warn`.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === CONFIG logging macros ===

#[macro_export]
macro_rules! log_config_debug {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::debug!(component = $crate::logging::Component::CONFIG, $($($field)+,)? $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::info!(component = $crate::logging::Component::CLI, $($($field)+,)? $msg)
    };
}

#[macro_export]
macro_rules! log_cli_debug {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::debug!(component = $crate::logging::Component::CLI, $($($field)+,)? $msg)
    };
}

// === VFS logging macros ===

#[macro_export]
macro_rules! log_vfs_info {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::info!(component = $crate::logging::Component::VFS, $($($field)+,)? $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_warn {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::warn!(component = $crate::logging::Component::VFS, $($($field)+,)? $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_debug {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::debug!(component = $crate::logging::Component::VFS, $($($field)+,)? $msg)
    };
}

// === STORE logging macros ===

#[macro_export]
macro_rules! log_store_debug {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::debug!(component = $crate::logging::Component::STORE, $($($field)+,)? $msg)
    };
}

#[macro_export]
macro_rules! log_store_warn {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::warn!(component = $crate::logging::Component::STORE, $($($field)+,)? $msg)
    };
}

// === TREE logging macros ===

#[macro_export]
macro_rules! log_tree_warn {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::warn!(component = $crate::logging::Component::TREE, $($($field)+,)? $msg)
    };
}

#[macro_export]
macro_rules! log_tree_info {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::info!(component = $crate::logging::Component::TREE, $($($field)+,)? $msg)
    };
}

#[macro_export]
macro_rules! log_tree_debug {
    ($msg:literal $(, $($field:tt)+)?) => {
        tracing::debug!(component = $crate::logging::Component::TREE, $($($field)+,)? $msg)
    };
}

/// Initialize logging with the given level filter.
///
/// `REPOINDEX_LOG` wins over `RUST_LOG`, which wins over `level`.
/// Call this once at application startup.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("REPOINDEX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
