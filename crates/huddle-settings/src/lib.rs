//! # huddle-settings
//!
//! Configuration for the huddle relay, loaded from three layers (later layers
//! win):
//! 1. **Compiled defaults**: [`HuddleSettings::default()`]
//! 2. **Settings file**: JSON, `~/.huddle/settings.json` unless overridden
//! 3. **Environment variables**: `HUDDLE_*`, `__` separates nested keys
//!    (e.g. `HUDDLE_SERVER__PORT=9000`)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path, ENV_PREFIX};
pub use types::*;
