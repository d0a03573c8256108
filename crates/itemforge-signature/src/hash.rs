use crate::source::SpriteSource;
use itemforge_client::decompress_to_rgb;
use itemforge_types::{ClientItem, Sprite};
use md5::{Digest, Md5};
use tracing::debug;

const TILE: usize = Sprite::DEFAULT_SIZE;

/// Computes the 16-byte content fingerprint of an item's sprite set.
///
/// Sprites are visited in `(layer, height, width)` order. Each decoded
/// 32x32 RGB tile is flipped on the y axis and fed to the digest as BGR0
/// quads, preserving the byte order the fingerprint format was defined
/// over. Sprites that are missing or fail to decode contribute nothing.
pub fn sprite_hash<S: SpriteSource>(item: &ClientItem, source: &S) -> [u8; 16] {
    let mut hasher = Md5::new();
    for_each_tile(item, |index| {
        let Some(&sprite_id) = item.sprite_ids.get(index) else {
            return;
        };
        let Some(sprite) = source.sprite(sprite_id) else {
            return;
        };
        if !sprite.is_valid() {
            return;
        }
        let Ok(rgb) = decompress_to_rgb(sprite) else {
            debug!(sprite_id, "undecodable sprite left out of hash");
            return;
        };
        let mut rgba = [0u8; Sprite::ARGB_PIXELS_DATA_SIZE];
        for y in 0..TILE {
            for x in 0..TILE {
                let src = (TILE - y - 1) * TILE * 3 + x * 3;
                let dst = y * TILE * 4 + x * 4;
                rgba[dst] = rgb[src + 2];
                rgba[dst + 1] = rgb[src + 1];
                rgba[dst + 2] = rgb[src];
                rgba[dst + 3] = 0;
            }
        }
        hasher.update(rgba);
    });
    hasher.finalize().into()
}

fn for_each_tile(item: &ClientItem, mut visit: impl FnMut(usize)) {
    let width = usize::from(item.width);
    let height = usize::from(item.height);
    for l in 0..usize::from(item.layers) {
        for h in 0..height {
            for w in 0..width {
                visit(w + h * width + l * width * height);
            }
        }
    }
}
