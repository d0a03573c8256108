//! Stable user-facing message table. Wording is frozen; tooling and tests
//! match on these strings.

pub fn file_not_found(path: &str) -> String {
    format!("The file '{path}' could not be found.")
}

pub fn file_access_denied(path: &str) -> String {
    format!("Access to file '{path}' was denied.")
}

pub fn file_too_small(size: u64, min: u64) -> String {
    format!("The file is too small to be a valid OTB file ({size} bytes, minimum {min}).")
}

pub fn file_too_big(size: u64, max: u64) -> String {
    format!("The file is too large ({size} bytes, maximum {max}).")
}

pub fn invalid_signature() -> String {
    "The file does not appear to be a valid OTB file.".to_string()
}

pub fn unsupported_version(major: u32) -> String {
    format!("The file version is not supported. Major {major} exceeds 3.")
}

pub fn duplicate_item_id(id: u16) -> String {
    format!("Duplicate item IDs found: {id}.")
}

pub fn too_many_items(count: u64, max: u64) -> String {
    format!("The file contains too many items. Count {count} exceeds maximum {max}.")
}

pub fn data_corrupted(details: &str) -> String {
    format!("The file data appears to be corrupted. {details}")
}

pub fn checksum_mismatch() -> String {
    "The file checksum does not match the expected value.".to_string()
}

pub fn invalid_item(details: &str) -> String {
    format!("The file contains invalid item data. {details}")
}
