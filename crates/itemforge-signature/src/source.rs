use itemforge_client::ClientSession;
use itemforge_types::Sprite;
use std::collections::HashMap;

/// Anything that can resolve sprite ids to sprite records.
pub trait SpriteSource {
    fn sprite(&self, sprite_id: u32) -> Option<&Sprite>;
}

impl SpriteSource for ClientSession {
    fn sprite(&self, sprite_id: u32) -> Option<&Sprite> {
        ClientSession::sprite(self, sprite_id)
    }
}

impl SpriteSource for HashMap<u32, Sprite> {
    fn sprite(&self, sprite_id: u32) -> Option<&Sprite> {
        self.get(&sprite_id)
    }
}
