use itemforge_tree::TreeError;
use itemforge_types::Cancelled;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtbError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid file signature 0x{0:08X}")]
    InvalidSignature(u32),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("unsupported version: major {major} exceeds 3")]
    InvalidVersion { major: u32 },
    #[error(
        "attribute 0x{attribute:02X} has length {actual}, expected {expected} (item {context})"
    )]
    AttributeValidationFailed {
        attribute: u8,
        expected: u16,
        actual: u16,
        context: String,
    },
    #[error("invalid item data: {0}")]
    InvalidItemData(String),
    #[error("duplicate server id {0}")]
    DuplicateServerId(u16),
    #[error("aborted after {0} corrupted items")]
    TooManyCorruptItems(usize),
    #[error("node structure error: {0}")]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OtbResult<T> = Result<T, OtbError>;
