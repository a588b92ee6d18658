//! # Hearken Configuration
//!
//! Type-safe configuration for the listener engine, loaded from TOML.
//!
//! Every section has sensible defaults, so an empty (or missing) file yields a
//! working configuration:
//!
//! ```toml
//! [storage]
//! path = "/var/lib/hearken/listeners.db"
//!
//! [runner]
//! timeout_ms = 2000
//!
//! [registry]
//! max_listeners_per_selector = 32
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearken_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! println!("budget: {:?}", config.runner.timeout());
//! # Ok::<(), hearken_config::ConfigError>(())
//! ```

#![warn(missing_docs)]

mod components;
mod loader;

pub use components::*;
pub use loader::*;
