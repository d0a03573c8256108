use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings consumed by the headless driver. Values are read once at
/// startup and handed to the subsystems as explicit configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_max_backups_per_file")]
    pub max_backups_per_file: usize,
    #[serde(default = "default_max_backup_age_days")]
    pub max_backup_age_days: u32,
    #[serde(default = "default_max_backup_storage_bytes")]
    pub max_backup_storage_bytes: u64,
    #[serde(default = "default_true")]
    pub verify_integrity_on_create: bool,
    #[serde(default = "default_true")]
    pub verify_integrity_on_restore: bool,
    #[serde(default = "default_true")]
    pub validate_on_open: bool,
    #[serde(default = "default_true")]
    pub validate_on_save: bool,
    #[serde(default = "default_true")]
    pub create_backup_on_save: bool,
    #[serde(default)]
    pub auto_save_enabled: bool,
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval_seconds: u64,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_max_backups_per_file() -> usize {
    10
}

fn default_max_backup_age_days() -> u32 {
    30
}

fn default_max_backup_storage_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_auto_save_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            max_backups_per_file: default_max_backups_per_file(),
            max_backup_age_days: default_max_backup_age_days(),
            max_backup_storage_bytes: default_max_backup_storage_bytes(),
            verify_integrity_on_create: true,
            verify_integrity_on_restore: true,
            validate_on_open: true,
            validate_on_save: true,
            create_backup_on_save: true,
            auto_save_enabled: false,
            auto_save_interval_seconds: default_auto_save_interval(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn backup_config(&self) -> itemforge_backup::BackupConfig {
        itemforge_backup::BackupConfig {
            backup_dir: self.backup_dir.clone(),
            max_backups_per_file: self.max_backups_per_file,
            max_backup_age_days: self.max_backup_age_days,
            max_backup_storage_bytes: self.max_backup_storage_bytes,
            verify_integrity_on_create: self.verify_integrity_on_create,
            verify_integrity_on_restore: self.verify_integrity_on_restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = Config::load(Path::new("/nonexistent/itemforge.toml")).unwrap();
        assert_eq!(config.max_backups_per_file, 10);
        assert!(config.validate_on_open);
        assert!(!config.auto_save_enabled);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("itemforge.toml");
        std::fs::write(&path, "max_backups_per_file = 3\nvalidate_on_save = false\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_backups_per_file, 3);
        assert!(!config.validate_on_save);
        assert_eq!(config.max_backup_age_days, 30);
    }
}
