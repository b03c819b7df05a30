//! Bridge settings loaded from TOML.
//!
//! - `parse_settings_toml(content)` parses and validates a full settings file
//! - `Settings::default()` uses the embedded defaults
//! - Settings travel inside the editable's context; there is no global instance

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub composition: CompositionSettings,
    pub sync: SyncSettings,
    #[serde(default)]
    pub keys: KeySettings,
}

/// Underline thickness heuristics; approximate, not a contract.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositionSettings {
    pub dotted_max_thickness: f32,
    pub bold_min_thickness: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    pub check_consistency: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeySettings {
    pub synthesize_from_text: bool,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            synthesize_from_text: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("embedded settings TOML must be valid")
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    let c = &s.composition;
    if c.dotted_max_thickness.is_nan() || c.dotted_max_thickness < 0.0 {
        return Err(SettingsError::InvalidValue {
            field: "composition.dotted_max_thickness".to_string(),
            reason: "must be >= 0".to_string(),
        });
    }
    if c.bold_min_thickness <= c.dotted_max_thickness {
        return Err(SettingsError::InvalidValue {
            field: "composition.bold_min_thickness".to_string(),
            reason: "must be greater than composition.dotted_max_thickness".to_string(),
        });
    }
    Ok(())
}
