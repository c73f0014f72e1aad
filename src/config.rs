use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::ingest::IngestOptions;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatapylerConfig {
    pub database: Option<String>,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    pub export_dir: Option<String>,
}

impl DatapylerConfig {
    /// Config written by `datapyler init`
    pub fn starter() -> Self {
        Self {
            database: Some(default_database_path_in(Path::new(".")).display().to_string()),
            encoding: Some("iso-8859-1".to_string()),
            delimiter: Some(','),
            export_dir: Some(".".to_string()),
        }
    }

    pub fn ingest_options(&self) -> anyhow::Result<IngestOptions> {
        let mut options = IngestOptions::default();
        if let Some(label) = &self.encoding {
            options = options.with_encoding_label(label)?;
        }
        if let Some(delimiter) = self.delimiter {
            options = options.with_delimiter(delimiter)?;
        }
        Ok(options)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("datapyler.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".datapyler").join("datapyler.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<DatapylerConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: DatapylerConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &DatapylerConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
