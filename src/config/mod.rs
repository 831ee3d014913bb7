//! Configuration.
//!
//! All option structs derive serde with `#[serde(default)]`, so a JSON
//! file only needs the keys it changes.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cli` | `-key=value` property parsing |
//! | `client` | [`ClientOptions`] |
//! | `server` | [`ServerOptions`], [`HttpOptions`] |

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Command-line properties.
pub mod cli;

/// Client options.
pub mod client;

/// Server options.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{ListenOptions, Properties, options_from_properties, parse_properties};
pub use client::ClientOptions;
pub use server::{HttpOptions, ServerOptions};

// ============================================================================
// Loading
// ============================================================================

/// Loads options from a JSON file.
///
/// # Errors
///
/// [`Error::Io`](crate::Error::Io) if the file cannot be read,
/// [`Error::Json`](crate::Error::Json) if it does not parse.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    let value = serde_json::from_str(&text)?;
    debug!(path = %path.display(), "Loaded configuration");
    Ok(value)
}
