//! Import/export options and the TOML preferences they are usually built from.

use crate::{format::FormatVersion, parsers::DetailsError};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, result::Result as StdResult};

/// How a texture reference is derived from an image path on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TexturePathStyle {
    /// Path relative to the textures folder, without extension (`detail\grass_a`).
    #[default]
    Full,
    /// Only the file stem (`grass_a`).
    NameOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Lay the palette models of a level out side by side. When off, they all sit at the
    /// level's origin.
    pub models_in_a_row: bool,
    /// Decode the geometry embedded in `.details` files. When off, its framing is checked and
    /// only the names are kept.
    pub load_models: bool,
    /// Decode the slot grid. When off, its size is checked and the grid is left empty.
    pub load_slots: bool,
    /// Where texture references are resolved to image files.
    pub textures_folder: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            models_in_a_row: true,
            load_models: true,
            load_slots: true,
            textures_folder: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub texture_path_style: TexturePathStyle,
    pub textures_folder: Option<PathBuf>,
    /// Embed palette geometry in `.details` files instead of writing bare names.
    pub models_in_a_row: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            texture_path_style: TexturePathStyle::Full,
            textures_folder: None,
            models_in_a_row: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub textures_folder: Option<PathBuf>,
    #[serde(default)]
    pub texture_path_style: TexturePathStyle,
    /// Build range used to read version 2 `.details` files.
    #[serde(default = "default_import_format")]
    pub import_format: FormatVersion,
    #[serde(default)]
    pub export_format: FormatVersion,
    #[serde(default = "default_true")]
    pub models_in_a_row: bool,
    #[serde(default = "default_true")]
    pub load_models: bool,
    #[serde(default = "default_true")]
    pub load_slots: bool,
}

fn default_true() -> bool {
    true
}

fn default_import_format() -> FormatVersion {
    FormatVersion::Builds1096To1230
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            textures_folder: None,
            texture_path_style: TexturePathStyle::default(),
            import_format: default_import_format(),
            export_format: FormatVersion::default(),
            models_in_a_row: true,
            load_models: true,
            load_slots: true,
        }
    }
}

impl Preferences {
    pub fn from_toml_str(s: &str) -> StdResult<Self, DetailsError> {
        toml::from_str(s).map_err(|e| DetailsError::Config(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> StdResult<Self, DetailsError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> StdResult<String, DetailsError> {
        toml::to_string_pretty(self).map_err(|e| DetailsError::Config(e.to_string()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> StdResult<(), DetailsError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            models_in_a_row: self.models_in_a_row,
            load_models: self.load_models,
            load_slots: self.load_slots,
            textures_folder: self.textures_folder.clone(),
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            texture_path_style: self.texture_path_style,
            textures_folder: self.textures_folder.clone(),
            models_in_a_row: self.models_in_a_row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let prefs = Preferences::from_toml_str("").unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.import_format, FormatVersion::Builds1096To1230);
        assert_eq!(prefs.export_format, FormatVersion::Builds1569ToCop);
        assert_eq!(prefs.import_options(), ImportOptions::default());
        assert_eq!(prefs.export_options(), ExportOptions::default());
    }

    #[test]
    fn reads_every_field() {
        let prefs = Preferences::from_toml_str(
            r#"
            textures_folder = "/games/stalker/textures"
            texture_path_style = "name_only"
            import_format = "builds_1233-1558"
            export_format = "builds_1096-1230"
            models_in_a_row = false
            load_models = false
            load_slots = false
            "#,
        )
        .unwrap();

        assert_eq!(prefs.import_format, FormatVersion::Builds1233To1558);
        assert_eq!(prefs.export_format, FormatVersion::Builds1096To1230);

        let import = prefs.import_options();
        assert!(!import.models_in_a_row);
        assert!(!import.load_models);
        assert!(!import.load_slots);
        assert_eq!(import.textures_folder, Some(PathBuf::from("/games/stalker/textures")));
        assert_eq!(prefs.export_options().texture_path_style, TexturePathStyle::NameOnly);
    }

    #[test]
    fn serialize_roundtrip() {
        let prefs = Preferences {
            textures_folder: Some(PathBuf::from("textures")),
            texture_path_style: TexturePathStyle::NameOnly,
            ..Preferences::default()
        };
        let text = prefs.to_toml_string().unwrap();
        assert_eq!(Preferences::from_toml_str(&text).unwrap(), prefs);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = Preferences::from_toml_str("import_format = \"builds_9999\"").unwrap_err();
        assert!(matches!(err, DetailsError::Config(_)));
    }

    #[test]
    fn load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("details.toml");
        let prefs = Preferences {
            load_slots: false,
            ..Preferences::default()
        };
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
        assert!(matches!(
            Preferences::load(dir.path().join("missing.toml")),
            Err(DetailsError::Io(_))
        ));
    }
}
