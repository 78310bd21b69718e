//! # EQ Presets
//!
//! Named band settings. Four presets ship built in; users can save their
//! own and tweak a single "custom" preset band by band.
//!
//! | id | name | bass | mid | treble |
//! |---|---|---|---|---|
//! | `default` | Default | 0 | 0 | 0 |
//! | `bass-boost` | Bass Boost | 7 | 0 | -2 |
//! | `vocal-boost` | Vocal Clarity | -3 | 5 | 2 |
//! | `treble-boost` | Treble Boost | -2 | 0 | 6 |

use crate::engine::eq::{EqBand, EqBands};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PRESET_ID: &str = "default";
pub const CUSTOM_PRESET_ID: &str = "custom";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqPreset {
    pub id: String,
    pub name: String,
    pub bands: EqBands,
    /// The preset that cannot be deleted
    #[serde(default)]
    pub is_default: bool,
}

impl EqPreset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, bands: EqBands) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bands,
            is_default: false,
        }
    }

    pub fn builtin() -> Vec<EqPreset> {
        vec![
            EqPreset {
                is_default: true,
                ..EqPreset::new(DEFAULT_PRESET_ID, "Default", EqBands::flat())
            },
            EqPreset::new("bass-boost", "Bass Boost", EqBands::new(7.0, 0.0, -2.0)),
            EqPreset::new("vocal-boost", "Vocal Clarity", EqBands::new(-3.0, 5.0, 2.0)),
            EqPreset::new("treble-boost", "Treble Boost", EqBands::new(-2.0, 0.0, 6.0)),
        ]
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresetError {
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("The default preset cannot be deleted")]
    CannotDeleteDefault,

    #[error("Preset name cannot be empty")]
    EmptyName,
}

/// Preset list plus the current selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRegistry {
    presets: Vec<EqPreset>,
    current: String,
    next_custom_id: u64,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self {
            presets: EqPreset::builtin(),
            current: DEFAULT_PRESET_ID.to_string(),
            next_custom_id: 1,
        }
    }
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presets(&self) -> &[EqPreset] {
        &self.presets
    }

    pub fn get(&self, id: &str) -> Option<&EqPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn current_id(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> Option<&EqPreset> {
        self.get(&self.current)
    }

    /// Make `id` current and return its bands for the engine.
    pub fn select(&mut self, id: &str) -> Result<EqPreset, PresetError> {
        let preset = self
            .get(id)
            .cloned()
            .ok_or_else(|| PresetError::UnknownPreset(id.to_string()))?;
        self.current = preset.id.clone();
        Ok(preset)
    }

    /// Save `bands` under a new id and make it current.
    pub fn save(&mut self, name: &str, bands: EqBands) -> Result<EqPreset, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }

        let id = loop {
            let candidate = format!("user-{}", self.next_custom_id);
            self.next_custom_id += 1;
            if self.get(&candidate).is_none() {
                break candidate;
            }
        };

        let preset = EqPreset::new(id, name, bands);
        self.presets.push(preset.clone());
        self.current = preset.id.clone();
        Ok(preset)
    }

    /// Delete `id`. Deleting the current preset reselects the default one,
    /// which is returned so the caller can apply it.
    pub fn delete(&mut self, id: &str) -> Result<Option<EqPreset>, PresetError> {
        let preset = self
            .get(id)
            .ok_or_else(|| PresetError::UnknownPreset(id.to_string()))?;
        if preset.is_default {
            return Err(PresetError::CannotDeleteDefault);
        }

        self.presets.retain(|p| p.id != id);

        if self.current == id {
            self.current = DEFAULT_PRESET_ID.to_string();
            return Ok(self.get(DEFAULT_PRESET_ID).cloned());
        }
        Ok(None)
    }

    /// Change one band of the "custom" preset, creating it from `base` when
    /// absent, and make it current. Returns the resulting bands.
    pub fn update_custom_band(&mut self, band: EqBand, gain_db: f32, base: EqBands) -> EqBands {
        let bands = match self.presets.iter_mut().find(|p| p.id == CUSTOM_PRESET_ID) {
            Some(custom) => {
                custom.bands = custom.bands.with(band, gain_db);
                custom.bands
            }
            None => {
                let bands = base.with(band, gain_db);
                self.presets
                    .push(EqPreset::new(CUSTOM_PRESET_ID, "Custom", bands));
                bands
            }
        };
        self.current = CUSTOM_PRESET_ID.to_string();
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets() {
        let registry = PresetRegistry::new();
        assert_eq!(registry.presets().len(), 4);
        assert_eq!(registry.current_id(), DEFAULT_PRESET_ID);
        assert!(registry.current().unwrap().is_default);

        let vocal = registry.get("vocal-boost").unwrap();
        assert_eq!(vocal.name, "Vocal Clarity");
        assert_eq!(vocal.bands, EqBands::new(-3.0, 5.0, 2.0));
    }

    #[test]
    fn test_select_unknown_preset() {
        let mut registry = PresetRegistry::new();
        assert_eq!(
            registry.select("loudness"),
            Err(PresetError::UnknownPreset("loudness".into()))
        );
        assert_eq!(registry.select("bass-boost").unwrap().bands.bass_db, 7.0);
        assert_eq!(registry.current_id(), "bass-boost");
    }

    #[test]
    fn test_default_preset_cannot_be_deleted() {
        let mut registry = PresetRegistry::new();
        assert_eq!(
            registry.delete(DEFAULT_PRESET_ID),
            Err(PresetError::CannotDeleteDefault)
        );
        assert_eq!(registry.presets().len(), 4);
    }

    #[test]
    fn test_deleting_current_preset_reverts_to_default() {
        let mut registry = PresetRegistry::new();
        let saved = registry
            .save("Late Night", EqBands::new(-2.0, 1.0, -4.0))
            .unwrap();
        assert_eq!(registry.current_id(), saved.id);

        let fallback = registry.delete(&saved.id).unwrap().unwrap();
        assert_eq!(fallback.id, DEFAULT_PRESET_ID);
        assert_eq!(registry.current_id(), DEFAULT_PRESET_ID);
        assert!(registry.get(&saved.id).is_none());
    }

    #[test]
    fn test_deleting_other_preset_keeps_selection() {
        let mut registry = PresetRegistry::new();
        registry.select("vocal-boost").unwrap();
        assert_eq!(registry.delete("treble-boost").unwrap(), None);
        assert_eq!(registry.current_id(), "vocal-boost");
    }

    #[test]
    fn test_saved_ids_are_unique() {
        let mut registry = PresetRegistry::new();
        let a = registry.save("A", EqBands::flat()).unwrap();
        let b = registry.save("A", EqBands::flat()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(registry.save("   ", EqBands::flat()), Err(PresetError::EmptyName));
    }

    #[test]
    fn test_custom_band_updates() {
        let mut registry = PresetRegistry::new();
        let base = registry.select("bass-boost").unwrap().bands;

        let bands = registry.update_custom_band(EqBand::Treble, 3.0, base);
        assert_eq!(bands, EqBands::new(7.0, 0.0, 3.0));
        assert_eq!(registry.current_id(), CUSTOM_PRESET_ID);

        let bands = registry.update_custom_band(EqBand::Mid, -1.0, EqBands::flat());
        assert_eq!(bands, EqBands::new(7.0, -1.0, 3.0));
        assert_eq!(
            registry
                .presets()
                .iter()
                .filter(|p| p.id == CUSTOM_PRESET_ID)
                .count(),
            1
        );
    }
}
