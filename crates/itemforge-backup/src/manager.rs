use crate::record::{BackupKind, BackupRecord, Sidecar};
use chrono::{DateTime, Duration, Utc};
use md5::{Digest, Md5};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no backup found for {0}")]
    NoBackupFound(String),
    #[error("backup is corrupted: {0}")]
    BackupCorrupted(String),
    #[error("checksum mismatch after copy to {0}")]
    ChecksumMismatch(String),
    #[error("sidecar metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackupResult<T> = Result<T, BackupError>;

/// Retention and verification policy, injected at construction time.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    pub max_backups_per_file: usize,
    /// Zero disables age-based eviction.
    pub max_backup_age_days: u32,
    pub max_backup_storage_bytes: u64,
    pub verify_integrity_on_create: bool,
    pub verify_integrity_on_restore: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backups"),
            max_backups_per_file: 10,
            max_backup_age_days: 30,
            max_backup_storage_bytes: 1024 * 1024 * 1024,
            verify_integrity_on_create: true,
            verify_integrity_on_restore: true,
        }
    }
}

/// Flat-directory backup store with sidecar metadata.
pub struct BackupManager {
    config: BackupConfig,
}

impl BackupManager {
    pub fn new(config: BackupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Copies `original` into the store and runs retention. The record is
    /// written to a `.meta` sidecar next to the backup.
    pub fn create_backup(
        &self,
        original: &Path,
        kind: BackupKind,
        description: &str,
    ) -> BackupResult<BackupRecord> {
        self.create_backup_at(original, kind, description, Utc::now())
    }

    /// Like [`create_backup`](Self::create_backup) with an explicit
    /// timestamp, which also names the backup file.
    pub fn create_backup_at(
        &self,
        original: &Path,
        kind: BackupKind,
        description: &str,
        timestamp: DateTime<Utc>,
    ) -> BackupResult<BackupRecord> {
        fs::create_dir_all(&self.config.backup_dir)?;
        let data = fs::read(original)?;
        let checksum = hex_md5(&data);
        let backup_path = self
            .config
            .backup_dir
            .join(BackupRecord::file_name(original, kind, timestamp));

        fs::write(&backup_path, &data)?;

        if self.config.verify_integrity_on_create {
            let written = fs::read(&backup_path)?;
            if hex_md5(&written) != checksum {
                fs::remove_file(&backup_path).ok();
                return Err(BackupError::BackupCorrupted(
                    backup_path.display().to_string(),
                ));
            }
        }

        let record = BackupRecord {
            backup_id: Uuid::new_v4().to_string(),
            original_path: original.to_path_buf(),
            backup_path: backup_path.clone(),
            kind,
            timestamp,
            original_size: data.len() as u64,
            backup_size: data.len() as u64,
            checksum,
            description: description.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            is_valid: true,
        };
        self.write_sidecar(&record)?;
        info!(backup = %backup_path.display(), kind = kind.token(), "backup created");

        self.apply_retention(original)?;
        self.check_storage_pressure()?;
        Ok(record)
    }

    /// Backups belonging to one original, newest first. Files without a
    /// sidecar degrade to what the file name carries.
    pub fn find_backups(&self, original: &Path) -> BackupResult<Vec<BackupRecord>> {
        let base = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut records: Vec<BackupRecord> = self
            .all_backups()?
            .into_iter()
            .filter(|r| {
                r.original_path == original
                    || r.backup_path
                        .file_name()
                        .map(|n| n.to_string_lossy().starts_with(&format!("{base}_")))
                        .unwrap_or(false)
            })
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Every backup in the store, in directory order.
    pub fn all_backups(&self) -> BackupResult<Vec<BackupRecord>> {
        let mut records = Vec::new();
        let dir = match fs::read_dir(&self.config.backup_dir) {
            Ok(dir) => dir,
            Err(_) => return Ok(records),
        };
        for entry in dir.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !name.ends_with(".bak") {
                continue;
            }
            records.push(self.load_record(&path, &name)?);
        }
        Ok(records)
    }

    pub fn latest_backup(&self, original: &Path) -> BackupResult<BackupRecord> {
        self.find_backups(original)?
            .into_iter()
            .next()
            .ok_or_else(|| BackupError::NoBackupFound(original.display().to_string()))
    }

    /// Restores the newest backup over the original path.
    pub fn restore_latest(&self, original: &Path) -> BackupResult<BackupRecord> {
        let record = self.latest_backup(original)?;
        self.restore(&record, original)?;
        Ok(record)
    }

    pub fn restore_by_timestamp(
        &self,
        original: &Path,
        timestamp: DateTime<Utc>,
    ) -> BackupResult<BackupRecord> {
        let record = self
            .find_backups(original)?
            .into_iter()
            .find(|r| r.timestamp == timestamp)
            .ok_or_else(|| BackupError::NoBackupFound(original.display().to_string()))?;
        self.restore(&record, original)?;
        Ok(record)
    }

    pub fn restore_by_id(&self, backup_id: &str) -> BackupResult<BackupRecord> {
        let record = self
            .all_backups()?
            .into_iter()
            .find(|r| r.backup_id == backup_id)
            .ok_or_else(|| BackupError::NoBackupFound(backup_id.to_string()))?;
        let target = record.original_path.clone();
        self.restore(&record, &target)?;
        Ok(record)
    }

    /// Copy backup over target with verification, snapshotting the current
    /// target first.
    fn restore(&self, record: &BackupRecord, target: &Path) -> BackupResult<()> {
        let backup_data = fs::read(&record.backup_path)?;
        if self.config.verify_integrity_on_restore && !record.checksum.is_empty() {
            if hex_md5(&backup_data) != record.checksum {
                return Err(BackupError::BackupCorrupted(
                    record.backup_path.display().to_string(),
                ));
            }
        }

        if target.exists() {
            self.create_backup(target, BackupKind::PreModification, "before restore")?;
        }

        fs::write(target, &backup_data)?;
        let restored = fs::read(target)?;
        if hex_md5(&restored) != hex_md5(&backup_data) {
            return Err(BackupError::ChecksumMismatch(target.display().to_string()));
        }
        info!(backup = %record.backup_path.display(), target = %target.display(), "backup restored");
        Ok(())
    }

    pub fn verify_integrity(&self, record: &BackupRecord) -> bool {
        if record.checksum.is_empty() {
            return record.backup_path.exists();
        }
        match fs::read(&record.backup_path) {
            Ok(data) => hex_md5(&data) == record.checksum,
            Err(_) => false,
        }
    }

    pub fn storage_usage(&self) -> BackupResult<u64> {
        let mut total = 0;
        if let Ok(dir) = fs::read_dir(&self.config.backup_dir) {
            for entry in dir.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().ends_with(".bak") {
                    total += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }
        Ok(total)
    }

    /// Drops backups beyond the per-file count cap (oldest first) and
    /// those older than the age cap.
    fn apply_retention(&self, original: &Path) -> BackupResult<()> {
        let backups = self.find_backups(original)?;
        for stale in backups.iter().skip(self.config.max_backups_per_file) {
            self.delete_backup(stale);
        }
        if self.config.max_backup_age_days > 0 {
            let cutoff = Utc::now() - Duration::days(i64::from(self.config.max_backup_age_days));
            for old in backups
                .iter()
                .take(self.config.max_backups_per_file)
                .filter(|r| r.timestamp < cutoff)
            {
                self.delete_backup(old);
            }
        }
        Ok(())
    }

    fn check_storage_pressure(&self) -> BackupResult<()> {
        let usage = self.storage_usage()?;
        if usage > self.config.max_backup_storage_bytes {
            // Policy: report size pressure, never silently delete for it.
            warn!(
                usage,
                limit = self.config.max_backup_storage_bytes,
                "backup storage over budget"
            );
        }
        Ok(())
    }

    fn delete_backup(&self, record: &BackupRecord) {
        debug!(backup = %record.backup_path.display(), "evicting backup");
        fs::remove_file(&record.backup_path).ok();
        fs::remove_file(sidecar_path(&record.backup_path)).ok();
    }

    fn write_sidecar(&self, record: &BackupRecord) -> BackupResult<()> {
        let sidecar = Sidecar::from_record(record);
        let json = serde_json::to_string_pretty(&sidecar)?;
        fs::write(sidecar_path(&record.backup_path), json)?;
        Ok(())
    }

    fn load_record(&self, path: &Path, name: &str) -> BackupResult<BackupRecord> {
        let meta_path = sidecar_path(path);
        if let Ok(raw) = fs::read_to_string(&meta_path) {
            if let Ok(sidecar) = serde_json::from_str::<Sidecar>(&raw) {
                return Ok(BackupRecord {
                    backup_id: sidecar.backup_id,
                    original_path: PathBuf::from(sidecar.original_path),
                    backup_path: path.to_path_buf(),
                    kind: BackupKind::from_index(sidecar.kind).unwrap_or(BackupKind::Manual),
                    timestamp: DateTime::parse_from_rfc3339(&sidecar.timestamp)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    original_size: sidecar.file_size,
                    backup_size: sidecar.backup_size,
                    checksum: sidecar.checksum,
                    description: sidecar.description,
                    app_version: sidecar.app_version,
                    is_valid: sidecar.is_valid,
                });
            }
        }
        // Sidecar missing: reconstruct what the file name encodes.
        let (kind, timestamp) =
            BackupRecord::parse_file_name(name).unwrap_or((BackupKind::Manual, Utc::now()));
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Ok(BackupRecord {
            backup_id: String::new(),
            original_path: PathBuf::new(),
            backup_path: path.to_path_buf(),
            kind,
            timestamp,
            original_size: size,
            backup_size: size,
            checksum: String::new(),
            description: String::new(),
            app_version: String::new(),
            is_valid: path.exists(),
        })
    }
}

fn sidecar_path(backup_path: &Path) -> PathBuf {
    let mut name = backup_path.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

fn hex_md5(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    let mut out = String::with_capacity(32);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manager_in(dir: &Path) -> BackupManager {
        BackupManager::new(BackupConfig {
            backup_dir: dir.join("backups"),
            ..BackupConfig::default()
        })
    }

    #[test]
    fn test_backup_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("A.otb");
        let content: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        fs::write(&original, &content).unwrap();
        let expected_md5 = hex_md5(&content);

        let manager = manager_in(dir.path());
        let record = manager
            .create_backup(&original, BackupKind::Manual, "unit test")
            .unwrap();
        assert_eq!(record.checksum, expected_md5);
        assert_eq!(record.original_size, 4096);

        fs::remove_file(&original).unwrap();
        manager.restore_latest(&original).unwrap();
        assert_eq!(hex_md5(&fs::read(&original).unwrap()), expected_md5);
    }

    #[test]
    fn test_sidecar_fields() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("items.otb");
        fs::write(&original, b"payload").unwrap();

        let manager = manager_in(dir.path());
        let record = manager
            .create_backup(&original, BackupKind::PreSave, "before save")
            .unwrap();

        let raw = fs::read_to_string(sidecar_path(&record.backup_path)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["originalPath"], original.display().to_string());
        assert_eq!(json["type"], 2);
        assert_eq!(json["fileSize"], 7);
        assert_eq!(json["description"], "before save");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["checksum"], hex_md5(b"payload"));
    }

    #[test]
    fn test_retention_count_cap_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("items.otb");
        fs::write(&original, b"v").unwrap();

        let manager = BackupManager::new(BackupConfig {
            backup_dir: dir.path().join("backups"),
            max_backups_per_file: 2,
            ..BackupConfig::default()
        });
        for hour in 1..=4 {
            let ts = Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap();
            manager
                .create_backup_at(&original, BackupKind::Automatic, "", ts)
                .unwrap();
        }
        let kept = manager.find_backups(&original).unwrap();
        assert_eq!(kept.len(), 2);
        // Newest survive.
        assert_eq!(kept[0].timestamp.format("%H").to_string(), "04");
        assert_eq!(kept[1].timestamp.format("%H").to_string(), "03");
    }

    #[test]
    fn test_age_cap_evicts_old_backups() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("items.otb");
        fs::write(&original, b"v").unwrap();

        let manager = BackupManager::new(BackupConfig {
            backup_dir: dir.path().join("backups"),
            max_backup_age_days: 7,
            ..BackupConfig::default()
        });
        let ancient = Utc::now() - Duration::days(30);
        manager
            .create_backup_at(&original, BackupKind::Manual, "", ancient)
            .unwrap();
        // A fresh create triggers retention, which evicts the old copy.
        manager
            .create_backup(&original, BackupKind::Manual, "")
            .unwrap();
        let kept = manager.find_backups(&original).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].timestamp > ancient);
    }

    #[test]
    fn test_missing_sidecar_degrades_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("backups");
        fs::create_dir_all(&store).unwrap();
        fs::write(store.join("items_premod_20260801_120000.bak"), b"old bytes").unwrap();

        let manager = manager_in(dir.path());
        let records = manager.find_backups(&dir.path().join("items.otb")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, BackupKind::PreModification);
        assert_eq!(
            records[0].timestamp,
            Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
        );
        assert!(records[0].checksum.is_empty());
    }

    #[test]
    fn test_tampered_backup_fails_restore() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("items.otb");
        fs::write(&original, b"good data").unwrap();

        let manager = manager_in(dir.path());
        let record = manager
            .create_backup(&original, BackupKind::Manual, "")
            .unwrap();
        fs::write(&record.backup_path, b"evil data").unwrap();

        let err = manager.restore_latest(&original).unwrap_err();
        assert!(matches!(err, BackupError::BackupCorrupted(_)));
        // Original untouched.
        assert_eq!(fs::read(&original).unwrap(), b"good data");
    }

    #[test]
    fn test_restore_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("items.otb");
        fs::write(&original, b"state one").unwrap();

        let manager = manager_in(dir.path());
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        let record = manager
            .create_backup_at(&original, BackupKind::Checkpoint, "cp", ts)
            .unwrap();

        fs::write(&original, b"state two").unwrap();
        manager.restore_by_id(&record.backup_id).unwrap();
        assert_eq!(fs::read(&original).unwrap(), b"state one");
    }

    #[test]
    fn test_restore_creates_premodification_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("items.otb");
        fs::write(&original, b"current").unwrap();

        let manager = manager_in(dir.path());
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        manager
            .create_backup_at(&original, BackupKind::Manual, "", ts)
            .unwrap();
        fs::write(&original, b"newer work").unwrap();
        manager.restore_by_timestamp(&original, ts).unwrap();

        let kinds: Vec<BackupKind> = manager
            .find_backups(&original)
            .unwrap()
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert!(kinds.contains(&BackupKind::PreModification));
        assert_eq!(fs::read(&original).unwrap(), b"current");
    }
}
