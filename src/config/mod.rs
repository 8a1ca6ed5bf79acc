//! Settings and configuration module
//!
//! Provides one immutable [`Settings`] value with:
//! - Builder pattern
//! - Environment loading (`.env` is read by the binary before lookup)
//! - Validation of every URL, interval and proxy credential pair

pub mod settings;

pub use settings::{ConfigError, Settings, SettingsBuilder, SolverKind};
