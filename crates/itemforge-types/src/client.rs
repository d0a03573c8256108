use serde::{Deserialize, Serialize};

/// A client-side item definition parsed from a DAT file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientItem {
    pub client_id: u16,

    pub width: u8,
    pub height: u8,
    pub layers: u8,
    pub pattern_x: u8,
    pub pattern_y: u8,
    pub pattern_z: u8,
    pub frames: u8,
    /// Product of the seven geometry fields; always equals
    /// `sprite_ids.len()` after a successful parse.
    pub num_sprites: u32,
    pub sprite_ids: Vec<u32>,

    /// Client-flag word accumulated while walking the flag stream. The
    /// bit layout is the DAT dialect's, not the server item layout.
    pub flags: u32,
    pub ground_speed: u16,
    pub light_level: u16,
    pub light_color: u16,
    pub max_read_chars: u16,
    pub max_read_write_chars: u16,
    pub minimap_color: u16,
    pub trade_as: u16,
}

impl ClientItem {
    pub fn new(client_id: u16) -> Self {
        Self {
            client_id,
            width: 1,
            height: 1,
            layers: 1,
            pattern_x: 1,
            pattern_y: 1,
            pattern_z: 1,
            frames: 1,
            ..Self::default()
        }
    }

    pub fn sprite_geometry_product(&self) -> u32 {
        u32::from(self.width)
            * u32::from(self.height)
            * u32::from(self.layers)
            * u32::from(self.pattern_x)
            * u32::from(self.pattern_y)
            * u32::from(self.pattern_z)
            * u32::from(self.frames)
    }
}

/// A run-length-compressed sprite tile from a SPR file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub sprite_id: u32,
    pub size: u32,
    pub compressed_pixels: Vec<u8>,
    pub transparent: bool,
}

impl Sprite {
    /// Tiles are square with this edge length.
    pub const DEFAULT_SIZE: usize = 32;
    /// Decoded RGB payload length (32 * 32 * 3).
    pub const RGB_PIXELS_DATA_SIZE: usize = 3072;
    /// Canonicalized RGBA payload length (32 * 32 * 4).
    pub const ARGB_PIXELS_DATA_SIZE: usize = 4096;

    pub fn is_valid(&self) -> bool {
        self.sprite_id > 0 && self.size > 0 && !self.compressed_pixels.is_empty()
    }
}
