use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use spendsort_categorize::LearnerConfig;
use spendsort_import::{CsvImportProfile, CsvSource};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "spendsort.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub csv_folder: PathBuf,
    pub rules_path: PathBuf,
    pub database_path: PathBuf,
    pub learning: LearnerConfig,
    pub sources: Vec<SourceEntry>,
}

/// A registered CSV file: either a named preset or a full inline profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<CsvImportProfile>,
}

impl SourceEntry {
    fn preset(file: &str, preset: &str) -> Self {
        Self {
            file: file.to_string(),
            preset: Some(preset.to_string()),
            profile: None,
        }
    }

    pub fn resolve(&self) -> Result<CsvSource> {
        let profile = match (&self.preset, &self.profile) {
            (Some(_), Some(_)) => {
                bail!("source '{}' sets both preset and profile", self.file)
            }
            (Some(name), None) => CsvImportProfile::preset(name).with_context(|| {
                format!(
                    "source '{}': unknown preset '{name}' (expected citi, smartly or costco)",
                    self.file
                )
            })?,
            (None, Some(profile)) => profile.clone(),
            (None, None) => bail!("source '{}' needs a preset or a profile", self.file),
        };
        Ok(CsvSource::new(&self.file, profile))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            csv_folder: PathBuf::from("csv"),
            rules_path: PathBuf::from("categorization_rules.toml"),
            database_path: PathBuf::from("spendsort.db"),
            learning: LearnerConfig::default(),
            sources: vec![
                SourceEntry::preset("Year to date.CSV", "citi"),
                SourceEntry::preset("Credit Card - 1604_01-01-2025_08-29-2025.csv", "smartly"),
                SourceEntry::preset("costco_transactions.csv", "costco"),
            ],
        }
    }
}

impl AppConfig {
    pub fn sources(&self) -> Result<Vec<CsvSource>> {
        self.sources.iter().map(SourceEntry::resolve).collect()
    }

    /// Makes relative paths relative to the directory holding the config file.
    fn anchor(mut self, base: &Path) -> Self {
        for path in [
            &mut self.csv_folder,
            &mut self.rules_path,
            &mut self.database_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

/// `--config` wins, then `./spendsort.toml`, then the per-user config dir.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    match directories::ProjectDirs::from("com", "spendsort", "spendsort") {
        Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
        None => local,
    }
}

/// A missing file yields the defaults, anchored next to where it would live.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default().anchor(base));
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg.anchor(base))
}

pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let s = toml::to_string_pretty(&AppConfig::default()).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
