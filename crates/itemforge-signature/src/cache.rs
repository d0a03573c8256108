use crate::hash::sprite_hash;
use crate::perceptual::{sprite_signature, SpriteSignature};
use crate::source::SpriteSource;
use itemforge_types::ClientItem;
use std::collections::HashMap;

/// Per-client memo for both fingerprints, keyed by client id.
///
/// The cache's lifetime matches the loaded client; dropping it alongside
/// the session keeps reloads coherent. Behavior is unchanged with the
/// cache bypassed, it only saves recomputation.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    hashes: HashMap<u16, [u8; 16]>,
    signatures: HashMap<u16, SpriteSignature>,
    block_size: usize,
}

impl FingerprintCache {
    pub fn new(block_size: usize) -> Self {
        Self {
            hashes: HashMap::new(),
            signatures: HashMap::new(),
            block_size: block_size.max(1),
        }
    }

    pub fn hash_for<S: SpriteSource>(&mut self, item: &ClientItem, source: &S) -> [u8; 16] {
        if let Some(hash) = self.hashes.get(&item.client_id) {
            return *hash;
        }
        let hash = sprite_hash(item, source);
        self.hashes.insert(item.client_id, hash);
        hash
    }

    pub fn signature_for<S: SpriteSource>(
        &mut self,
        item: &ClientItem,
        source: &S,
    ) -> SpriteSignature {
        if let Some(signature) = self.signatures.get(&item.client_id) {
            return signature.clone();
        }
        let signature = sprite_signature(item, source, self.block_size);
        self.signatures.insert(item.client_id, signature.clone());
        signature
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
        self.signatures.clear();
    }

    pub fn len(&self) -> usize {
        self.hashes.len().max(self.signatures.len())
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemforge_types::Sprite;
    use std::collections::HashMap;

    #[test]
    fn test_cached_results_match_direct_computation() {
        let sprites: HashMap<u32, Sprite> = HashMap::new();
        let mut item = ClientItem::new(140);
        item.num_sprites = 1;
        item.sprite_ids = vec![3];

        let mut cache = FingerprintCache::new(1);
        let cached = cache.hash_for(&item, &sprites);
        assert_eq!(cached, sprite_hash(&item, &sprites));
        let again = cache.hash_for(&item, &sprites);
        assert_eq!(cached, again);

        let signature = cache.signature_for(&item, &sprites);
        assert_eq!(signature, sprite_signature(&item, &sprites, 1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
