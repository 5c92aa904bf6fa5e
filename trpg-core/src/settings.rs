//! Flat, shallow-merged user settings.

use crate::persist::{read_json, write_json, KeyValueStore, PersistError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default illustration style.
pub const DEFAULT_IMAGE_STYLE: &str = "fantasy art, cinematic lighting, highly detailed";

/// How scene illustrations are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    #[default]
    Off,
    Pollinations,
    Gemini,
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageMode::Off => "off",
            ImageMode::Pollinations => "pollinations",
            ImageMode::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

fn default_image_style() -> String {
    DEFAULT_IMAGE_STYLE.to_string()
}

/// Effective settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub image_mode: ImageMode,
    #[serde(default = "default_image_style")]
    pub image_style: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::default(),
            image_style: default_image_style(),
        }
    }
}

/// Keys to overwrite. Unset fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mode: Option<ImageMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_style: Option<String>,
}

impl SettingsPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image mode.
    pub fn with_image_mode(mut self, mode: ImageMode) -> Self {
        self.image_mode = Some(mode);
        self
    }

    /// Set the illustration style prompt.
    pub fn with_image_style(mut self, style: impl Into<String>) -> Self {
        self.image_style = Some(style.into());
        self
    }
}

/// Store for the settings object.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl SettingsStore {
    /// Create a store for the settings object under `key`.
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Stored settings laid over the defaults.
    ///
    /// A stored value that does not parse (an unknown image mode, say) reads
    /// as the default for that key; the stored text is left as it is.
    pub fn get(&self) -> Result<Settings, PersistError> {
        let stored = self.stored()?;
        let defaults = Settings::default();

        Ok(Settings {
            image_mode: field_or(&stored, "image_mode", defaults.image_mode),
            image_style: field_or(&stored, "image_style", defaults.image_style),
        })
    }

    /// Overwrite the top-level keys present in `patch`, keeping every other
    /// stored key, and return the effective settings.
    pub fn save(&self, patch: &SettingsPatch) -> Result<Settings, PersistError> {
        let mut stored = self.stored()?;
        let changes = to_object(patch)?;
        debug!(keys = ?changes.keys().collect::<Vec<_>>(), "saving settings");
        stored.extend(changes);

        write_json(self.backend.as_ref(), &self.key, &stored)?;
        self.get()
    }

    /// Raw stored object; empty if nothing has been saved.
    fn stored(&self) -> Result<Map<String, Value>, PersistError> {
        Ok(read_json(self.backend.as_ref(), &self.key)?.unwrap_or_default())
    }
}

fn field_or<T: DeserializeOwned>(stored: &Map<String, Value>, key: &str, default: T) -> T {
    match stored.get(key).map(|v| T::deserialize(v)) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            warn!(key, error = %e, "ignoring unreadable setting");
            default
        }
        None => default,
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>, PersistError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
