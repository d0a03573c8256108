use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unknown file signature 0x{0:08X}")]
    UnknownSignature(u32),
    #[error("not enough data while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("unknown flag 0x{flag:02X} in item {item}")]
    UnknownFlag { flag: u8, item: u16 },
    #[error("client version mismatch: item definitions are {dat}, sprites are {spr}")]
    VersionMismatch { dat: String, spr: String },
    #[error("sprite {id} is corrupt: {reason}")]
    SpriteCorrupt { id: u32, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
