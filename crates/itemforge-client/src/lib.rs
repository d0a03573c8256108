mod dat;
mod error;
mod session;
mod spr;
mod sprite_codec;
mod version;

pub use dat::{client_flag, DatFile, DatParser};
pub use error::{ClientError, ClientResult};
pub use session::ClientSession;
pub use spr::{SprFile, SprParser};
pub use sprite_codec::{compress_rgb, decompress_to_rgb, TRANSPARENT_COLOR};
pub use version::{Band, SpriteIdWidth, dat_version, spr_version, Version};
