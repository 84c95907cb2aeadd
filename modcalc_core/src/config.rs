use crate::build::CompiledModule;
use crate::calculator::{AttributeScaling, CalcConfig, Enemy, DEFAULT_BLEED_FRACTION, DEFAULT_CRIT_MULTIPLIER};
use crate::crafting::{CraftingBasic, ItemModifierTable, RawItemModifier};
use crate::error::CalcError;
use crate::modifier::{compile_mods, RawMod};
use crate::registry::StatRegistry;
use crate::skill::RawSkill;
use crate::tree::RawModTree;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Module-wide rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Flag names registered after the standard ones
    #[serde(default)]
    pub flags: Vec<String>,
    /// Condition names registered after the standard ones
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default = "default_bleed_fraction")]
    pub bleed_fraction: f64,
    #[serde(default = "default_crit_multiplier")]
    pub base_crit_multiplier: f64,
    #[serde(default)]
    pub attribute_scaling: AttributeScaling,
}

fn default_bleed_fraction() -> f64 {
    DEFAULT_BLEED_FRACTION
}

fn default_crit_multiplier() -> f64 {
    DEFAULT_CRIT_MULTIPLIER
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            flags: Vec::new(),
            conditions: Vec::new(),
            bleed_fraction: DEFAULT_BLEED_FRACTION,
            base_crit_multiplier: DEFAULT_CRIT_MULTIPLIER,
            attribute_scaling: AttributeScaling::default(),
        }
    }
}

impl GameConfig {
    /// Calculator settings before an enemy or a hit simulation is chosen
    pub fn calc_config(&self) -> CalcConfig {
        CalcConfig {
            bleed_fraction: self.bleed_fraction,
            base_crit_multiplier: self.base_crit_multiplier,
            attribute_scaling: self.attribute_scaling,
            ..CalcConfig::default()
        }
    }
}

fn default_level() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    #[serde(default = "default_level")]
    pub level: u32,
    /// Points available for the mod tree. Defaults to the player level.
    #[serde(default)]
    pub tree_points: Option<u32>,
    /// Mods every build starts with
    #[serde(default)]
    pub mods: Vec<RawMod>,
}

impl Default for PlayerData {
    fn default() -> Self {
        PlayerData {
            level: default_level(),
            tree_points: None,
            mods: Vec::new(),
        }
    }
}

impl PlayerData {
    pub fn available_points(&self) -> u32 {
        self.tree_points.unwrap_or(self.level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    #[serde(default)]
    pub modifiers: Vec<RawItemModifier>,
    #[serde(default)]
    pub crafting: CraftingBasic,
}

/// Everything a module supplies, before names are resolved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleData {
    #[serde(default)]
    pub config: GameConfig,
    #[serde(default)]
    pub player: PlayerData,
    #[serde(default)]
    pub skills: Vec<RawSkill>,
    #[serde(default)]
    pub enemies: Vec<Enemy>,
    #[serde(default)]
    pub items: Option<ItemData>,
    #[serde(default)]
    pub mod_tree: Option<RawModTree>,
}

impl ModuleData {
    /// Load a module from a directory
    /// Expected structure:
    ///   module/
    ///     module.toml    - [config] and [player]
    ///     skills/        - .toml files containing [[skills]] arrays
    ///     enemies/       - .toml files containing [[enemies]] arrays
    ///     items/         - .toml files containing [[modifiers]] and an optional [crafting]
    ///     mod_tree.toml  - optional, [[nodes]] array
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let module_path = dir.join("module.toml");
        let header: ModuleFile = if module_path.exists() {
            let content = Self::read_file_with_context(&module_path)?;
            Self::parse_toml_with_context(&content, &module_path)?
        } else {
            ModuleFile::default()
        };

        let mut skills = Vec::new();
        for path in Self::toml_files(&dir.join("skills"))? {
            let content = Self::read_file_with_context(&path)?;
            let wrapper: SkillsWrapper = Self::parse_toml_with_context(&content, &path)?;
            skills.extend(wrapper.skills);
        }

        let mut enemies = Vec::new();
        for path in Self::toml_files(&dir.join("enemies"))? {
            let content = Self::read_file_with_context(&path)?;
            let wrapper: EnemiesWrapper = Self::parse_toml_with_context(&content, &path)?;
            enemies.extend(wrapper.enemies);
        }

        let item_files = Self::toml_files(&dir.join("items"))?;
        let items = if item_files.is_empty() {
            None
        } else {
            let mut items = ItemData::default();
            let mut crafting_from: Option<PathBuf> = None;
            for path in item_files {
                let content = Self::read_file_with_context(&path)?;
                let wrapper: ItemsWrapper = Self::parse_toml_with_context(&content, &path)?;
                items.modifiers.extend(wrapper.modifiers);
                if let Some(crafting) = wrapper.crafting {
                    match &crafting_from {
                        Some(first) => tracing::warn!(
                            "ignoring [crafting] in '{}', already defined in '{}'",
                            path.display(),
                            first.display()
                        ),
                        None => {
                            items.crafting = crafting;
                            crafting_from = Some(path);
                        }
                    }
                }
            }
            Some(items)
        };

        let tree_path = dir.join("mod_tree.toml");
        let mod_tree = if tree_path.exists() {
            let content = Self::read_file_with_context(&tree_path)?;
            Some(Self::parse_toml_with_context(&content, &tree_path)?)
        } else {
            None
        };

        let module = ModuleData {
            config: header.config,
            player: header.player,
            skills,
            enemies,
            items,
            mod_tree,
        };
        tracing::info!(
            dir = %dir.display(),
            skills = module.skills.len(),
            enemies = module.enemies.len(),
            modifiers = module.items.as_ref().map_or(0, |i| i.modifiers.len()),
            "loaded module"
        );
        Ok(module)
    }

    /// Load a module from one JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|error| ConfigError::Json { error })
    }

    /// Resolve every name through a registry built from this module's config
    pub fn compile(&self) -> Result<CompiledModule, CalcError> {
        let registry = StatRegistry::with_names(&self.config.flags, &self.config.conditions)?;

        let skills = self
            .skills
            .iter()
            .map(|s| s.compile(&registry))
            .collect::<Result<Vec<_>, _>>()?;
        let player_mods = compile_mods(&self.player.mods, &registry)?;
        let mod_tree = match &self.mod_tree {
            Some(raw) => raw.compile(&registry)?,
            None => Default::default(),
        };
        let (item_table, crafting) = match &self.items {
            Some(items) => (
                ItemModifierTable::compile(&items.modifiers, &registry)?,
                items.crafting.clone(),
            ),
            None => (ItemModifierTable::default(), CraftingBasic::default()),
        };

        Ok(CompiledModule {
            registry,
            config: self.config.clone(),
            player_level: self.player.level,
            tree_points: self.player.available_points(),
            player_mods,
            skills,
            enemies: self.enemies.clone(),
            item_table,
            crafting,
            mod_tree,
        })
    }

    /// `.toml` files of a directory in name order. A missing directory has none.
    fn toml_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in Self::read_dir_with_context(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "toml") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    // Helper functions for error context

    fn read_dir_with_context(dir: &Path) -> Result<std::fs::ReadDir, ConfigError> {
        std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
            error: e,
            path: Some(dir.to_path_buf()),
        })
    }

    fn read_file_with_context(path: &Path) -> Result<String, ConfigError> {
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            error: e,
            path: Some(path.to_path_buf()),
        })
    }

    fn parse_toml_with_context<T: serde::de::DeserializeOwned>(
        content: &str,
        path: &Path,
    ) -> Result<T, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            error: e,
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error with optional file path
    #[error("IO error{}: {error}", path.as_ref().map(|p| format!(" in '{}'", p.display())).unwrap_or_default())]
    Io {
        #[source]
        error: std::io::Error,
        path: Option<PathBuf>,
    },
    /// TOML parse error with file path and location details
    #[error("Parse error in '{}': {error}", path.display())]
    Parse {
        #[source]
        error: toml::de::Error,
        path: PathBuf,
    },
    #[error("JSON error: {error}")]
    Json {
        #[source]
        error: serde_json::Error,
    },
}

impl ConfigError {
    /// Get the file path associated with this error, if any
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            ConfigError::Io { path, .. } => path.as_deref(),
            ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Json { .. } => None,
        }
    }

    /// Get a user-friendly description of where the error occurred
    pub fn location_description(&self) -> String {
        match self {
            ConfigError::Io { path: Some(p), .. } => format!("File: {}", p.display()),
            ConfigError::Io { path: None, .. } => "Unknown location".to_string(),
            ConfigError::Parse { error, path } => {
                let mut desc = format!("File: {}", path.display());
                if let Some(span) = error.span() {
                    desc.push_str(&format!("\nPosition: bytes {}..{}", span.start, span.end));
                }
                desc
            }
            ConfigError::Json { error } => {
                format!("Line {}, column {}", error.line(), error.column())
            }
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io {
            error: e,
            path: None,
        }
    }
}

// Wrapper types for TOML parsing

#[derive(Default, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    config: GameConfig,
    #[serde(default)]
    player: PlayerData,
}

#[derive(Deserialize)]
struct SkillsWrapper {
    #[serde(default)]
    skills: Vec<RawSkill>,
}

#[derive(Deserialize)]
struct EnemiesWrapper {
    #[serde(default)]
    enemies: Vec<Enemy>,
}

#[derive(Deserialize)]
struct ItemsWrapper {
    #[serde(default)]
    modifiers: Vec<RawItemModifier>,
    #[serde(default)]
    crafting: Option<CraftingBasic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_defaults() {
        let module = ModuleData::from_json(r#"{"player": {"level": 12}}"#).unwrap();
        assert_eq!(module.player.level, 12);
        assert_eq!(module.player.available_points(), 12);
        assert_eq!(module.config.bleed_fraction, DEFAULT_BLEED_FRACTION);
        assert_eq!(module.config.base_crit_multiplier, DEFAULT_CRIT_MULTIPLIER);
        assert!(module.items.is_none());
        assert!(module.skills.is_empty());
    }

    #[test]
    fn test_from_json_reports_location() {
        let err = ModuleData::from_json("{\n  \"player\": 3\n}").unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.file_path().is_none());
        assert!(err.location_description().starts_with("Line 2"));
    }

    #[test]
    fn test_compile_extends_registry() {
        let module = ModuleData::from_json(
            r#"{
                "config": {"flags": ["spell"], "conditions": ["onslaught"]},
                "player": {"mods": [{"id": "base", "stats": [
                    {"name": "attackSpeed", "value": 1, "flags": ["spell"], "conditions": ["onslaught"]}
                ]}]}
            }"#,
        )
        .unwrap();
        let compiled = module.compile().unwrap();
        let spell = compiled.registry.resolve_flag("spell").unwrap();
        let onslaught = compiled.registry.resolve_condition("onslaught").unwrap();
        assert_eq!(compiled.player_mods[0].stats[0].flags, spell);
        assert_eq!(compiled.player_mods[0].stats[0].conditions, onslaught);
    }

    #[test]
    fn test_compile_unknown_flag_is_fatal() {
        let module = ModuleData::from_json(
            r#"{"skills": [{"kind": "attack", "id": "zap", "name": "Zap", "flags": ["lightning"]}]}"#,
        )
        .unwrap();
        assert_eq!(
            module.compile().unwrap_err(),
            CalcError::UnknownFlag("lightning".to_string())
        );
    }

    #[test]
    fn test_missing_dir_loads_empty_module() {
        let module = ModuleData::load_from_dir(Path::new("does/not/exist")).unwrap();
        assert_eq!(module, ModuleData::default());
    }

    #[test]
    fn test_parse_error_carries_path() {
        let dir = std::env::temp_dir().join(format!("modcalc_parse_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("module.toml");
        std::fs::write(&path, "[player]\nlevel = \"high\"\n").unwrap();

        let err = ModuleData::load_from_dir(&dir).unwrap_err();
        assert_eq!(err.file_path(), Some(path.as_path()));
        assert!(err.location_description().contains("Position: bytes"));
        assert!(err.to_string().starts_with("Parse error in"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
