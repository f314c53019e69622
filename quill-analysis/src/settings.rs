//! Server settings supplied through the client's `initializationOptions`.

use serde::Deserialize;

/// Feature toggles honored by the server runtime.
///
/// Every field defaults to enabled so an empty (or absent) options object
/// yields full functionality; unknown fields are ignored so older servers
/// tolerate newer clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Advertise and serve semantic tokens.
    pub semantic_tokens: bool,
    /// Publish diagnostics after analysis.
    pub diagnostics: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            semantic_tokens: true,
            diagnostics: true,
        }
    }
}

impl Settings {
    /// Parse settings from `initializationOptions`. Malformed options are
    /// logged and replaced by defaults rather than failing the handshake.
    pub fn from_initialization_options(options: Option<serde_json::Value>) -> Self {
        let Some(value) = options else {
            return Self::default();
        };
        match serde_json::from_value(value) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(%error, "invalid initializationOptions; using defaults");
                Self::default()
            }
        }
    }
}
