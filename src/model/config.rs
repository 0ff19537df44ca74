use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::state::EditorKind;

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub editor: EditorConfig,
    pub build: BuildConfig,
    pub crates: CratesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub source_file: String,
    pub auto_save_debounce_ms: u64,
    pub jump_to_first_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub kind: EditorKind,
    pub tab_width: u16,
    pub line_numbers: bool,
    pub scroll_off: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CratesConfig {
    pub available: Vec<String>,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user = directories::ProjectDirs::from("", "", "scratchpad")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
            .map(|path| fs::read_to_string(&path))
            .transpose()?;

        let mut config = Self::from_layers(user.as_deref())?;

        // Expand ~ in source_file
        if config.general.source_file.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            config.general.source_file =
                config
                    .general
                    .source_file
                    .replacen('~', &home.to_string_lossy(), 1);
        }

        Ok(config)
    }

    /// Parse the built-in defaults with `user` merged over them, key by key.
    pub fn from_layers(user: Option<&str>) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
        if let Some(user) = user {
            let overlay: toml::Table = toml::from_str(user)?;
            merge_tables(&mut merged, overlay);
        }
        Ok(toml::Value::Table(merged).try_into()?)
    }

    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(&self.general.source_file)
    }

    pub fn build_dir(&self) -> PathBuf {
        std::env::temp_dir().join("scratchpad-build")
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(overlay_table) => {
                if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
                    merge_tables(base_table, overlay_table);
                } else {
                    base.insert(key, toml::Value::Table(overlay_table));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Make sure `path` exists so the editor and the watcher have something to open.
pub fn ensure_source_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, "fn main() {\n    println!(\"Hello, world!\");\n}\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_parse() {
        let config = AppConfig::from_layers(None).unwrap();
        assert_eq!(config.editor.kind, EditorKind::Simple);
        assert_eq!(config.build.program, "rustc");
        assert!(config.build.args.iter().any(|a| a == "{file}"));
    }

    #[test]
    fn user_layer_overrides_only_given_keys() {
        let user = r#"
            [editor]
            kind = "advanced"

            [build]
            program = "cargo"
        "#;
        let config = AppConfig::from_layers(Some(user)).unwrap();

        assert_eq!(config.editor.kind, EditorKind::Advanced);
        assert_eq!(config.editor.tab_width, 4);
        assert_eq!(config.build.program, "cargo");
        assert!(!config.build.args.is_empty());
        assert_eq!(config.general.auto_save_debounce_ms, 500);
    }

    #[test]
    fn bad_editor_kind_is_rejected() {
        let user = "[editor]\nkind = \"fancy\"\n";
        assert!(AppConfig::from_layers(Some(user)).is_err());
    }

    #[test]
    fn ensure_source_file_creates_parents_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/main.rs");

        ensure_source_file(&path).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        assert!(first.contains("fn main()"));

        fs::write(&path, "// mine").unwrap();
        ensure_source_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "// mine");
    }
}
