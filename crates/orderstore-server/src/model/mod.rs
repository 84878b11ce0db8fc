//! Configuration model
//!
//! - `constants` - configuration keys and defaults
//! - `config` - `Configuration`, loaded from file, environment and command line

pub mod config;
pub mod constants;

pub use config::Configuration;
