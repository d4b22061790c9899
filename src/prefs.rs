use crate::error::PetError;
use crate::sprites::Breed;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "desktop-cat";
const PREFS_FILE: &str = "prefs.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub breed: Breed,
}

/// Where the preferences file lives.
#[derive(Resource, Clone, Debug)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/desktop-cat/prefs.json`, or the working directory when
    /// the platform has no config dir.
    pub fn in_config_dir() -> Self {
        let dir = dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(PREFS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Preferences, PetError> {
        let corrupt = |reason: String| PetError::PreferenceCorrupt {
            path: self.path.clone(),
            reason,
        };
        let text = std::fs::read_to_string(&self.path).map_err(|e| corrupt(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))
    }

    /// Reads the preferences, falling back to defaults on any failure.
    pub fn load(&self) -> Preferences {
        match self.read() {
            Ok(prefs) => prefs,
            Err(err) => {
                info!("{err}; using default breed");
                Preferences::default()
            }
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), PetError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(prefs).map_err(|e| PetError::PreferenceCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> PreferenceStore {
        let dir = std::env::temp_dir().join(format!("desktop-cat-test-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        PreferenceStore::new(dir.join(PREFS_FILE))
    }

    #[test]
    fn save_then_load() {
        let store = temp_store("roundtrip");
        store
            .save(&Preferences {
                breed: Breed::Siamese,
            })
            .unwrap();
        assert_eq!(store.load().breed, Breed::Siamese);
    }

    #[test]
    fn missing_file_gives_default() {
        let store = temp_store("missing");
        assert!(matches!(store.read(), Err(PetError::PreferenceCorrupt { .. })));
        assert_eq!(store.load(), Preferences::default());
        assert_eq!(store.load().breed, Breed::Orange);
    }

    #[test]
    fn unknown_breed_gives_default() {
        let store = temp_store("corrupt");
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{ "breed": "dragon" }"#).unwrap();
        assert!(store.read().is_err());
        assert_eq!(store.load().breed, Breed::Orange);
    }
}
