//! Command-line properties.
//!
//! Arguments of the form `-key=value` become properties. Values wrapped in
//! matching single or double quotes are unwrapped, a bare `-flag` maps to
//! an empty value and arguments without a leading `-` are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::load_json;

// ============================================================================
// Types
// ============================================================================

/// Parsed command-line properties.
pub type Properties = FxHashMap<String, String>;

/// Property naming a JSON options file.
pub const CONFIG_KEY: &str = "config";

/// Property overriding the bind interface.
pub const INTERFACE_KEY: &str = "interface";

/// Property overriding the bind port.
pub const PORT_KEY: &str = "port";

// ============================================================================
// Parsing
// ============================================================================

/// Parses `-key=value` arguments.
pub fn parse_properties<I, S>(args: I) -> Properties
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut properties = Properties::default();

    for arg in args {
        let Some(flag) = arg.as_ref().strip_prefix('-') else {
            continue;
        };

        match flag.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                properties.insert(key.to_string(), unquote(value).to_string());
            }
            // "-=x" has no key
            Some(_) => {}
            None => {
                properties.insert(flag.to_string(), String::new());
            }
        }
    }

    properties
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    let quoted = bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''));

    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

// ============================================================================
// Options
// ============================================================================

/// Options a server binary can take from properties.
pub trait ListenOptions: DeserializeOwned + Default {
    /// Overrides the bind interface.
    fn set_interface(&mut self, interface: String);

    /// Overrides the bind port.
    fn set_port(&mut self, port: u16);
}

impl ListenOptions for super::ServerOptions {
    fn set_interface(&mut self, interface: String) {
        self.interface = interface;
    }

    fn set_port(&mut self, port: u16) {
        self.port = port;
    }
}

impl ListenOptions for super::HttpOptions {
    fn set_interface(&mut self, interface: String) {
        self.interface = interface;
    }

    fn set_port(&mut self, port: u16) {
        self.port = port;
    }
}

/// Builds listener options from properties.
///
/// Starts from the `config` JSON file if given (defaults otherwise), then
/// applies `interface` and `port`. A port that is not a positive number
/// is ignored.
///
/// # Errors
///
/// [`Error::Io`] or [`Error::Json`] if the config file cannot be loaded.
pub fn options_from_properties<T: ListenOptions>(properties: &Properties) -> Result<T> {
    let mut options = match properties.get(CONFIG_KEY) {
        Some(path) if !path.is_empty() => load_json::<T>(Path::new(path))?,
        Some(_) => return Err(Error::config("config property needs a file path")),
        None => T::default(),
    };

    if let Some(interface) = properties.get(INTERFACE_KEY)
        && !interface.is_empty()
    {
        options.set_interface(interface.clone());
    }

    if let Some(port) = properties.get(PORT_KEY).and_then(|p| p.parse::<u16>().ok())
        && port > 0
    {
        options.set_port(port);
    }

    Ok(options)
}

// ============================================================================
// Tests
// ============================================================================
