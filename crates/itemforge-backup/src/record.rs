use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Why a backup was taken. The numeric value is what the sidecar stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BackupKind {
    Manual = 0,
    Automatic = 1,
    PreSave = 2,
    PreModification = 3,
    CrashRecovery = 4,
    Checkpoint = 5,
}

impl BackupKind {
    /// Token embedded in the backup file name.
    pub fn token(self) -> &'static str {
        match self {
            BackupKind::Manual => "manual",
            BackupKind::Automatic => "auto",
            BackupKind::PreSave => "presave",
            BackupKind::PreModification => "premod",
            BackupKind::CrashRecovery => "crash",
            BackupKind::Checkpoint => "checkpoint",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "manual" => Some(BackupKind::Manual),
            "auto" => Some(BackupKind::Automatic),
            "presave" => Some(BackupKind::PreSave),
            "premod" => Some(BackupKind::PreModification),
            "crash" => Some(BackupKind::CrashRecovery),
            "checkpoint" => Some(BackupKind::Checkpoint),
            _ => None,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(BackupKind::Manual),
            1 => Some(BackupKind::Automatic),
            2 => Some(BackupKind::PreSave),
            3 => Some(BackupKind::PreModification),
            4 => Some(BackupKind::CrashRecovery),
            5 => Some(BackupKind::Checkpoint),
            _ => None,
        }
    }
}

/// One backup on disk plus the bookkeeping around it.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRecord {
    pub backup_id: String,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub kind: BackupKind,
    pub timestamp: DateTime<Utc>,
    pub original_size: u64,
    pub backup_size: u64,
    /// Lowercase hex MD5 of the backed-up bytes. Empty when only the file
    /// name was available (sidecar missing).
    pub checksum: String,
    pub description: String,
    pub app_version: String,
    pub is_valid: bool,
}

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

impl BackupRecord {
    /// `<basename>_<kind>_<yyyyMMdd_hhmmss>.bak`
    pub fn file_name(original: &Path, kind: BackupKind, timestamp: DateTime<Utc>) -> String {
        let base = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup".into());
        format!(
            "{base}_{}_{}.bak",
            kind.token(),
            timestamp.format(TIMESTAMP_FORMAT)
        )
    }

    /// Recovers kind and timestamp from a backup file name; the fallback
    /// when no sidecar survives.
    pub fn parse_file_name(name: &str) -> Option<(BackupKind, DateTime<Utc>)> {
        let stem = name.strip_suffix(".bak")?;
        let mut parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 3 {
            return None;
        }
        let time = parts.pop()?;
        let date = parts.pop()?;
        let kind = BackupKind::from_token(parts.pop()?)?;
        let naive =
            NaiveDateTime::parse_from_str(&format!("{date}_{time}"), TIMESTAMP_FORMAT).ok()?;
        Some((kind, naive.and_utc()))
    }
}

/// Sidecar JSON layout (`<backup>.meta`). The first seven fields are the
/// stable interchange contract; the trailing ones carry the rest of the
/// record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Sidecar {
    pub original_path: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub timestamp: String,
    pub file_size: u64,
    pub description: String,
    pub checksum: String,
    pub is_valid: bool,
    #[serde(default)]
    pub backup_id: String,
    #[serde(default)]
    pub backup_size: u64,
    #[serde(default)]
    pub app_version: String,
}

impl Sidecar {
    pub fn from_record(record: &BackupRecord) -> Self {
        Self {
            original_path: record.original_path.display().to_string(),
            kind: record.kind as u8,
            timestamp: record.timestamp.to_rfc3339(),
            file_size: record.original_size,
            description: record.description.clone(),
            checksum: record.checksum.clone(),
            is_valid: record.is_valid,
            backup_id: record.backup_id.clone(),
            backup_size: record.backup_size,
            app_version: record.app_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 13, 45, 7).unwrap();
        let name = BackupRecord::file_name(Path::new("/data/items.otb"), BackupKind::PreSave, ts);
        assert_eq!(name, "items_presave_20260801_134507.bak");
        let (kind, parsed) = BackupRecord::parse_file_name(&name).unwrap();
        assert_eq!(kind, BackupKind::PreSave);
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_file_name_with_underscored_base() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let name =
            BackupRecord::file_name(Path::new("my_item_db.otb"), BackupKind::Manual, ts);
        let (kind, parsed) = BackupRecord::parse_file_name(&name).unwrap();
        assert_eq!(kind, BackupKind::Manual);
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_unparseable_names_are_rejected() {
        assert!(BackupRecord::parse_file_name("stray.bak").is_none());
        assert!(BackupRecord::parse_file_name("a_manual_garbage.bak").is_none());
        assert!(BackupRecord::parse_file_name("items.otb").is_none());
    }
}
