use crate::message;
use itemforge_otb::{OtbError, OtbReader, ReadOptions, SIGNATURE};
use itemforge_types::{ItemRange, ProgressSink, ServerItemList, ServerItemType, VersionInfo};
use md5::{Digest, Md5};
use std::path::Path;
use tracing::debug;

/// Increasing validation depth. Each level includes everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationLevel {
    Basic,
    Standard,
    Thorough,
    Paranoid,
}

/// Tunables injected at construction; no global state is consulted.
#[derive(Debug, Clone)]
pub struct ValidationSettings {
    pub min_file_size: u64,
    pub max_file_size: u64,
    pub max_item_count: u64,
    /// Lowercase hex MD5 of the whole file, compared at Paranoid level
    /// when supplied by the application.
    pub expected_checksum: Option<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_file_size: 16,
            max_file_size: 100 * 1024 * 1024,
            max_item_count: 65_535,
            expected_checksum: None,
        }
    }
}

/// Structured outcome of a validation run.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub level: ValidationLevel,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,

    pub file_size: u64,
    pub item_count: u64,
    pub version: Option<VersionInfo>,
    pub range: Option<ItemRange>,

    pub has_corruption: bool,
    pub corruption_details: Vec<String>,
}

impl ValidationResult {
    fn new(level: ValidationLevel) -> Self {
        Self {
            is_valid: true,
            level,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            file_size: 0,
            item_count: 0,
            version: None,
            range: None,
            has_corruption: false,
            corruption_details: Vec::new(),
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
        self.is_valid = false;
    }

    fn warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn corruption(&mut self, detail: String) {
        self.has_corruption = true;
        self.is_valid = false;
        self.corruption_details.push(detail);
    }
}

/// Multi-level integrity checker for item database files. Reports only;
/// it never repairs structure.
#[derive(Debug, Default)]
pub struct Validator {
    settings: ValidationSettings,
}

impl Validator {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    pub fn validate_file(&self, path: &Path, level: ValidationLevel) -> ValidationResult {
        let mut result = ValidationResult::new(level);

        if !path.exists() {
            result.error(message::file_not_found(&path.display().to_string()));
            self.finish(&mut result);
            return result;
        }
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(_) => {
                result.error(message::file_access_denied(&path.display().to_string()));
                self.finish(&mut result);
                return result;
            }
        };
        self.validate_data(&data, level, &mut result);
        self.finish(&mut result);
        result
    }

    pub fn validate_bytes(&self, data: &[u8], level: ValidationLevel) -> ValidationResult {
        let mut result = ValidationResult::new(level);
        self.validate_data(data, level, &mut result);
        self.finish(&mut result);
        result
    }

    fn validate_data(&self, data: &[u8], level: ValidationLevel, result: &mut ValidationResult) {
        result.file_size = data.len() as u64;
        self.check_basic(data, result);
        if !result.is_valid || level == ValidationLevel::Basic {
            return;
        }

        let list = self.check_standard(data, result);
        if level == ValidationLevel::Standard {
            return;
        }

        self.check_thorough(data, list.as_ref(), result);
        if level == ValidationLevel::Paranoid {
            self.check_paranoid(data, result);
        }
    }

    /// Existence and readability were checked by the caller; here: size
    /// bounds and the signature prologue.
    fn check_basic(&self, data: &[u8], result: &mut ValidationResult) {
        let size = data.len() as u64;
        if size < self.settings.min_file_size {
            result.error(message::file_too_small(size, self.settings.min_file_size));
            return;
        }
        if size > self.settings.max_file_size {
            result.error(message::file_too_big(size, self.settings.max_file_size));
            return;
        }
        let signature = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if signature != SIGNATURE {
            result.error(message::invalid_signature());
        }
    }

    /// Full strict-mode parse; statistics come from the parsed list.
    fn check_standard(&self, data: &[u8], result: &mut ValidationResult) -> Option<ServerItemList> {
        let mut reader = OtbReader::default();
        match reader.read_from_bytes(data.to_vec(), &mut ProgressSink::disabled()) {
            Ok(list) => {
                for warning in &reader.stats().warnings {
                    result.warning(warning.clone());
                }
                result.item_count = list.len() as u64;
                result.version = Some(list.version);
                result.range = Some(list.range);
                Some(list)
            }
            Err(e) => {
                result.error(map_parse_error(&e));
                None
            }
        }
    }

    /// Item-level consistency: duplicate ids, range agreement and
    /// per-item property checks. Runs its own lenient parse so it can
    /// see past the first hard error.
    fn check_thorough(
        &self,
        data: &[u8],
        strict_list: Option<&ServerItemList>,
        result: &mut ValidationResult,
    ) {
        let mut reader = OtbReader::new(ReadOptions {
            strict: false,
            ..ReadOptions::default()
        });
        let lenient = reader.read_from_bytes(data.to_vec(), &mut ProgressSink::disabled());
        for id in &reader.stats().duplicate_ids {
            let msg = message::duplicate_item_id(*id);
            if !result.errors.contains(&msg) {
                result.error(msg);
            } else {
                result.is_valid = false;
            }
        }

        let Some(list) = strict_list.or(lenient.as_ref().ok()) else {
            return;
        };
        if result.item_count == 0 {
            result.item_count = list.len() as u64;
        }

        if !list.is_empty() {
            let min = list.iter().map(|i| i.server_id).min().unwrap_or(0);
            let max = list.iter().map(|i| i.server_id).max().unwrap_or(0);
            if list.range.min_id != min || list.range.max_id != max {
                result.error(message::invalid_item(&format!(
                    "Declared range {}-{} does not match actual {}-{}.",
                    list.range.min_id, list.range.max_id, min, max
                )));
            }
        } else {
            result.warning("The item list is empty.".to_string());
        }

        for item in list.iter() {
            if item.server_id == 0 && item.item_type != ServerItemType::Deprecated {
                result.error(message::invalid_item(&format!(
                    "Item of type {:?} has ID 0.",
                    item.item_type
                )));
            }
            if item.name.is_empty() && item.item_type != ServerItemType::Deprecated {
                result.warning(format!("Item {} has no name.", item.server_id));
            }
        }
    }

    /// Structural corruption heuristics plus the optional checksum
    /// comparison.
    fn check_paranoid(&self, data: &[u8], result: &mut ValidationResult) {
        if result.item_count > self.settings.max_item_count {
            result.error(message::too_many_items(
                result.item_count,
                self.settings.max_item_count,
            ));
        }

        // A long NUL run past the header reads as blanked-out content.
        let window = &data[4.min(data.len())..data.len().min(4096)];
        let mut longest_run = 0usize;
        let mut current = 0usize;
        for &byte in window {
            if byte == 0 {
                current += 1;
                longest_run = longest_run.max(current);
            } else {
                current = 0;
            }
        }
        if longest_run >= 512 {
            result.corruption(format!(
                "Excessive NUL-byte run of {longest_run} bytes detected."
            ));
        }

        if let Some(expected) = &self.settings.expected_checksum {
            let actual = hex_md5(data);
            if !expected.eq_ignore_ascii_case(&actual) {
                result.corruption(message::checksum_mismatch());
            }
        }
    }

    fn finish(&self, result: &mut ValidationResult) {
        if result.has_corruption {
            result
                .suggestions
                .push("Restore the file from a backup.".to_string());
        }
        if result
            .errors
            .iter()
            .any(|e| e.contains("version is not supported"))
        {
            result
                .suggestions
                .push("Convert the database with a newer release before opening it.".to_string());
        }
        if !result.is_valid && result.suggestions.is_empty() {
            result
                .suggestions
                .push("Verify the file is a server item database and not a client asset.".to_string());
        }
        debug!(
            valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validation finished"
        );
    }
}

fn map_parse_error(error: &OtbError) -> String {
    match error {
        OtbError::InvalidSignature(_) => message::invalid_signature(),
        OtbError::InvalidVersion { major } => message::unsupported_version(*major),
        OtbError::DuplicateServerId(id) => message::duplicate_item_id(*id),
        OtbError::InvalidItemData(details) => message::invalid_item(details),
        other => message::data_corrupted(&other.to_string()),
    }
}

fn hex_md5(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemforge_otb::OtbWriter;
    use itemforge_types::{ServerItem, ServerItemList};

    fn sample_list() -> ServerItemList {
        let mut list = ServerItemList::new();
        list.version.major = 1;
        list.description = "validator fixture".into();
        let mut item = ServerItem::new(100, ServerItemType::Ground);
        item.client_id = 100;
        item.name = "dirt".into();
        list.add(item).unwrap();
        list
    }

    fn serialize(list: &ServerItemList) -> Vec<u8> {
        OtbWriter::new().serialize(list).unwrap().to_vec()
    }

    #[test]
    fn test_valid_file_passes_all_levels() {
        let data = serialize(&sample_list());
        let validator = Validator::default();
        for level in [
            ValidationLevel::Basic,
            ValidationLevel::Standard,
            ValidationLevel::Thorough,
            ValidationLevel::Paranoid,
        ] {
            let result = validator.validate_bytes(&data, level);
            assert!(result.is_valid, "level {level:?}: {:?}", result.errors);
        }
    }

    #[test]
    fn test_missing_file_reports_legacy_message() {
        let validator = Validator::default();
        let result =
            validator.validate_file(Path::new("/no/such/items.otb"), ValidationLevel::Basic);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("could not be found"));
    }

    #[test]
    fn test_bad_signature_message() {
        let validator = Validator::default();
        let mut data = serialize(&sample_list());
        data[0] = 0x42;
        let result = validator.validate_bytes(&data, ValidationLevel::Basic);
        assert_eq!(
            result.errors,
            vec!["The file does not appear to be a valid OTB file.".to_string()]
        );
    }

    #[test]
    fn test_standard_reports_statistics() {
        let data = serialize(&sample_list());
        let result = Validator::default().validate_bytes(&data, ValidationLevel::Standard);
        assert!(result.is_valid);
        assert_eq!(result.item_count, 1);
        assert_eq!(result.version.unwrap().major, 1);
        assert_eq!(result.range.unwrap().min_id, 100);
    }

    #[test]
    fn test_thorough_detects_duplicate_ids() {
        // Two item nodes both declaring server id 7.
        use itemforge_tree::TreeWriter;
        let mut tree = TreeWriter::new();
        tree.write_raw_u32(SIGNATURE);
        tree.begin_node(0);
        tree.write_u32(0);
        let mut version = [0u8; 140];
        version[0] = 1;
        tree.write_prop(0x01, &version);
        for _ in 0..2 {
            tree.begin_node(ServerItemType::Ground as u8);
            tree.write_u32(0);
            tree.write_prop(0x10, &7u16.to_le_bytes());
            tree.end_node().unwrap();
        }
        tree.end_node().unwrap();
        let data = tree.finish().unwrap().to_vec();

        let result = Validator::default().validate_bytes(&data, ValidationLevel::Thorough);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e == "Duplicate item IDs found: 7."));
    }

    #[test]
    fn test_unsupported_version_message() {
        let mut list = sample_list();
        list.version.major = 7;
        let data = serialize(&list);
        let result = Validator::default().validate_bytes(&data, ValidationLevel::Standard);
        assert!(result
            .errors
            .iter()
            .any(|e| e == "The file version is not supported. Major 7 exceeds 3."));
    }

    #[test]
    fn test_paranoid_flags_nul_runs() {
        let mut data = serialize(&sample_list());
        data.extend_from_slice(&vec![0u8; 2048]);
        let result = Validator::default().validate_bytes(&data, ValidationLevel::Paranoid);
        assert!(result.has_corruption);
        assert!(!result.corruption_details.is_empty());
        assert!(result
            .suggestions
            .iter()
            .any(|s| s.contains("backup")));
    }

    #[test]
    fn test_paranoid_checksum_comparison() {
        let data = serialize(&sample_list());
        let good = hex_md5(&data);
        let mut validator = Validator::new(ValidationSettings {
            expected_checksum: Some(good),
            ..ValidationSettings::default()
        });
        let result = validator.validate_bytes(&data, ValidationLevel::Paranoid);
        assert!(result.is_valid);

        validator = Validator::new(ValidationSettings {
            expected_checksum: Some("0".repeat(32)),
            ..ValidationSettings::default()
        });
        let result = validator.validate_bytes(&data, ValidationLevel::Paranoid);
        assert!(result.has_corruption);
    }

    #[test]
    fn test_size_bounds() {
        let validator = Validator::default();
        let result = validator.validate_bytes(&[0, 0, 0, 0], ValidationLevel::Basic);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("too small"));
    }
}
