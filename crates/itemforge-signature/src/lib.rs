mod cache;
mod hash;
mod perceptual;
mod source;

pub use cache::FingerprintCache;
pub use hash::sprite_hash;
pub use perceptual::{sprite_signature, SignatureError, SpriteSignature};
pub use source::SpriteSource;
